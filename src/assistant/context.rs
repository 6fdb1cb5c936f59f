//! Context resolution for the chat assistant.
//!
//! Picks a topic (message keywords first, then the current page), runs the
//! fixed queries for it and condenses the rows into a one-line summary that
//! starts with the topic label. Data errors never escape: they become part of
//! the context text.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::assistant::intent::{match_topic, page_topic, Topic, GENERAL_CONTEXT};
use crate::database::models::{f64_field, str_field, EsgTable};
use crate::database::source::EsgDataSource;
use crate::reports::{
    self, average, goal_progress, is_active, is_done, is_high_level, is_license_expired,
    is_capped, is_license_expiring, is_nc_open, is_task_overdue, sum_field, EXPIRING_WINDOW_DAYS,
    RECORD_LIMIT,
};
use crate::scoring::{self, WasteRecord};

/// Rows per table forwarded to the prompt. Aggregates use every fetched row,
/// which is at most `RECORD_LIMIT` of the most recent ones.
pub const PROMPT_SAMPLE: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedContext {
    pub topic: Option<Topic>,
    pub relevant_data: Map<String, Value>,
    pub context: String,
}

impl ResolvedContext {
    fn general() -> Self {
        Self {
            topic: None,
            relevant_data: Map::new(),
            context: GENERAL_CONTEXT.to_string(),
        }
    }

    pub fn data_found(&self) -> bool {
        !self.relevant_data.is_empty()
    }
}

/// Rows and summary produced by one topic loader
struct Loaded {
    data: Map<String, Value>,
    summary: String,
    /// A fetch hit the row limit
    truncated: bool,
}

impl Loaded {
    fn new(summary: String) -> Self {
        Self { data: Map::new(), summary, truncated: false }
    }

    fn with_rows(mut self, key: &str, rows: &[Value]) -> Self {
        self.truncated |= is_capped(rows);
        let sample = rows.iter().take(PROMPT_SAMPLE).cloned().collect();
        self.data.insert(key.to_string(), Value::Array(sample));
        self
    }

    fn context(&self, topic: Topic) -> String {
        if self.truncated {
            format!("{} {} (últimos {} registros)", topic.label(), self.summary, RECORD_LIMIT)
        } else {
            format!("{} {}", topic.label(), self.summary)
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Scope named in the message ("escopo 2", "scope 3"), if any.
fn requested_scope(lowered: &str) -> Option<i64> {
    (1..=3).find(|scope| {
        lowered.contains(&format!("escopo {scope}")) || lowered.contains(&format!("scope {scope}"))
    })
}

fn scope_of(record: &Value) -> Option<i64> {
    f64_field(record, "scope").map(|s| s as i64)
}

pub struct ContextResolver<'a> {
    source: &'a dyn EsgDataSource,
    today: NaiveDate,
}

impl<'a> ContextResolver<'a> {
    pub fn new(source: &'a dyn EsgDataSource, today: NaiveDate) -> Self {
        Self { source, today }
    }

    /// Resolve the context for a message. Never fails.
    pub async fn resolve(&self, message: &str, company_id: Uuid, current_page: Option<&str>) -> ResolvedContext {
        let topic = match_topic(message).or_else(|| current_page.and_then(page_topic));
        let Some(topic) = topic else {
            tracing::debug!("No topic for message, using general context");
            return ResolvedContext::general();
        };

        tracing::info!("Resolving assistant context for topic {:?}", topic);
        let lowered = message.to_lowercase();

        match self.load(topic, &lowered, company_id).await {
            Ok(loaded) => ResolvedContext {
                topic: Some(topic),
                context: loaded.context(topic),
                relevant_data: loaded.data,
            },
            Err(e) => {
                tracing::error!("Failed to load data for topic {:?}: {:#}", topic, e);
                ResolvedContext {
                    topic: Some(topic),
                    relevant_data: Map::new(),
                    context: format!("{} Erro ao buscar dados: {}", topic.label(), e),
                }
            }
        }
    }

    async fn fetch(&self, table: EsgTable, company_id: Uuid) -> Result<Vec<Value>> {
        self.source.fetch_records(table, company_id, RECORD_LIMIT).await
    }

    async fn load(&self, topic: Topic, lowered: &str, company_id: Uuid) -> Result<Loaded> {
        match topic {
            Topic::Licenses => self.licenses(lowered, company_id).await,
            Topic::Emissions => self.emissions(lowered, company_id).await,
            Topic::Goals => self.goals(company_id).await,
            Topic::Waste => self.waste(company_id).await,
            Topic::Energy => {
                let rows = self.fetch(EsgTable::EnergyConsumption, company_id).await?;
                let kwh = sum_field(&rows, "consumption_kwh");
                Ok(Loaded::new(format!(
                    "{:.0} kWh ({:.1} GJ) consumidos em {} registros.",
                    kwh,
                    scoring::kwh_to_gj(kwh),
                    rows.len()
                ))
                .with_rows("energyConsumption", &rows))
            }
            Topic::Water => {
                let rows = self.fetch(EsgTable::WaterConsumption, company_id).await?;
                Ok(Loaded::new(format!(
                    "{:.1} m³ consumidos em {} registros.",
                    sum_field(&rows, "volume_m3"),
                    rows.len()
                ))
                .with_rows("waterConsumption", &rows))
            }
            Topic::NonConformities => {
                let rows = self.fetch(EsgTable::NonConformities, company_id).await?;
                let open = rows.iter().filter(|r| is_nc_open(r)).count();
                Ok(Loaded::new(format!(
                    "{} registradas, {} abertas, {} encerradas.",
                    rows.len(),
                    open,
                    rows.len() - open
                ))
                .with_rows("nonConformities", &rows))
            }
            Topic::Compliance => {
                let rows = self.fetch(EsgTable::ComplianceTasks, company_id).await?;
                let pending = rows.iter().filter(|r| !is_done(r)).count();
                let overdue = rows.iter().filter(|r| is_task_overdue(r, self.today)).count();
                Ok(Loaded::new(format!(
                    "{} tarefas, {} pendentes, {} em atraso.",
                    rows.len(),
                    pending,
                    overdue
                ))
                .with_rows("complianceTasks", &rows))
            }
            Topic::Risks => {
                let rows = self.fetch(EsgTable::EsgRisks, company_id).await?;
                let high = rows.iter().filter(|r| is_high_level(r, "risk_level")).count();
                Ok(Loaded::new(format!("{} riscos mapeados, {} de nível alto ou crítico.", rows.len(), high))
                    .with_rows("risks", &rows))
            }
            Topic::Opportunities => {
                let rows = self.fetch(EsgTable::EsgOpportunities, company_id).await?;
                let high = rows.iter().filter(|r| is_high_level(r, "potential_impact")).count();
                Ok(Loaded::new(format!("{} oportunidades identificadas, {} de alto impacto.", rows.len(), high))
                    .with_rows("opportunities", &rows))
            }
            Topic::Audits => {
                let rows = self.fetch(EsgTable::Audits, company_id).await?;
                let done = rows.iter().filter(|r| is_done(r)).count();
                Ok(Loaded::new(format!(
                    "{} auditorias, {} concluídas, {} planejadas ou em andamento.",
                    rows.len(),
                    done,
                    rows.len() - done
                ))
                .with_rows("audits", &rows))
            }
            Topic::Documents => {
                let rows = self.fetch(EsgTable::Documents, company_id).await?;
                Ok(Loaded::new(format!("{} documentos armazenados.", rows.len())).with_rows("documents", &rows))
            }
            Topic::Employees => {
                let rows = self.fetch(EsgTable::Employees, company_id).await?;
                let active: Vec<&Value> = rows.iter().filter(|r| is_active(r)).collect();
                let departments: HashSet<&str> =
                    active.iter().filter_map(|r| str_field(r, "department")).collect();
                Ok(Loaded::new(format!(
                    "{} colaboradores ativos em {} departamentos.",
                    active.len(),
                    departments.len()
                ))
                .with_rows("employees", &rows))
            }
            Topic::Stakeholders => {
                let rows = self.fetch(EsgTable::Stakeholders, company_id).await?;
                let high = rows.iter().filter(|r| is_high_level(r, "influence_level")).count();
                Ok(Loaded::new(format!("{} partes interessadas mapeadas, {} de alta influência.", rows.len(), high))
                    .with_rows("stakeholders", &rows))
            }
            Topic::Suppliers => {
                let rows = self.fetch(EsgTable::Suppliers, company_id).await?;
                let active = rows.iter().filter(|r| is_active(r)).count();
                Ok(Loaded::new(format!("{} fornecedores cadastrados, {} ativos.", rows.len(), active))
                    .with_rows("suppliers", &rows))
            }
            Topic::Reports => {
                let report = reports::build_integrated_report(self.source, company_id, self.today).await?;
                let mut loaded = Loaded::new(format!(
                    "pontuação geral {:.1} ({}), Ambiental {:.1}, Social {:.1}, Governança {:.1}.",
                    report.overall_score,
                    report.rating,
                    report.environmental_score,
                    report.social_score,
                    report.governance_score
                ));
                loaded.truncated = report.truncated;
                loaded.data.insert("integratedReport".to_string(), serde_json::to_value(&report)?);
                Ok(loaded)
            }
            Topic::Overview => self.overview(company_id).await,
        }
    }

    async fn licenses(&self, lowered: &str, company_id: Uuid) -> Result<Loaded> {
        let rows = self.fetch(EsgTable::Licenses, company_id).await?;
        let expiring: Vec<Value> = rows
            .iter()
            .filter(|l| is_license_expiring(l, self.today))
            .cloned()
            .collect();
        let expired = rows.iter().filter(|l| is_license_expired(l, self.today)).count();

        let mut loaded = Loaded::new(format!(
            "{} cadastradas, {} vencendo nos próximos {} dias, {} vencidas.",
            rows.len(),
            expiring.len(),
            EXPIRING_WINDOW_DAYS,
            expired
        ))
        .with_rows("licenses", &rows);

        if contains_any(lowered, &["venc", "expi"]) {
            loaded = loaded.with_rows("expiringLicenses", &expiring);
        }
        Ok(loaded)
    }

    async fn emissions(&self, lowered: &str, company_id: Uuid) -> Result<Loaded> {
        let rows = self.fetch(EsgTable::Emissions, company_id).await?;
        let by_scope = |scope: i64| -> f64 {
            rows.iter()
                .filter(|r| scope_of(r) == Some(scope))
                .filter_map(|r| f64_field(r, "total_co2e"))
                .sum()
        };

        let summary = format!(
            "{:.2} tCO2e em {} registros (Escopo 1: {:.2}, Escopo 2: {:.2}, Escopo 3: {:.2}).",
            sum_field(&rows, "total_co2e"),
            rows.len(),
            by_scope(1),
            by_scope(2),
            by_scope(3)
        );

        match requested_scope(lowered) {
            Some(scope) => {
                let filtered: Vec<Value> = rows.iter().filter(|r| scope_of(r) == Some(scope)).cloned().collect();
                let mut loaded = Loaded::new(summary).with_rows("emissions", &filtered);
                loaded.truncated |= is_capped(&rows);
                loaded.data.insert("scopeFilter".to_string(), Value::from(scope));
                Ok(loaded)
            }
            None => Ok(Loaded::new(summary).with_rows("emissions", &rows)),
        }
    }

    async fn goals(&self, company_id: Uuid) -> Result<Loaded> {
        let rows = self.fetch(EsgTable::Goals, company_id).await?;
        let achieved = rows.iter().filter(|g| is_done(g) || goal_progress(g) >= 100.0).count();
        Ok(Loaded::new(format!(
            "{} metas, {} atingidas, progresso médio de {:.1}%.",
            rows.len(),
            achieved,
            average(rows.iter().map(goal_progress))
        ))
        .with_rows("goals", &rows))
    }

    async fn waste(&self, company_id: Uuid) -> Result<Loaded> {
        let rows = self.fetch(EsgTable::WasteLogs, company_id).await?;
        let records: Vec<WasteRecord> = rows.iter().map(WasteRecord::from_json).collect();
        Ok(Loaded::new(format!(
            "{} registros somando {:.2} t, taxa de reciclagem de {:.1}%.",
            rows.len(),
            scoring::total_waste_tonnes(&records),
            scoring::calculate_recycling_rate(&records)
        ))
        .with_rows("wasteLogs", &rows))
    }

    async fn overview(&self, company_id: Uuid) -> Result<Loaded> {
        let (licenses, goals, emissions, ncs) = futures::try_join!(
            self.fetch(EsgTable::Licenses, company_id),
            self.fetch(EsgTable::Goals, company_id),
            self.fetch(EsgTable::Emissions, company_id),
            self.fetch(EsgTable::NonConformities, company_id),
        )?;

        let expiring = licenses.iter().filter(|l| is_license_expiring(l, self.today)).count();
        let open_ncs = ncs.iter().filter(|nc| is_nc_open(nc)).count();

        Ok(Loaded::new(format!(
            "{} licenças ({} vencendo), {} metas com progresso médio de {:.1}%, {:.2} tCO2e inventariadas, {} não conformidades abertas.",
            licenses.len(),
            expiring,
            goals.len(),
            average(goals.iter().map(goal_progress)),
            sum_field(&emissions, "total_co2e"),
            open_ncs
        ))
        .with_rows("licenses", &licenses)
        .with_rows("goals", &goals)
        .with_rows("emissions", &emissions)
        .with_rows("nonConformities", &ncs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryEsgData;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn sample_data() -> InMemoryEsgData {
        InMemoryEsgData::new()
            .with(EsgTable::Licenses, json!({"name": "LO Fábrica", "status": "Ativa", "expiration_date": "2026-11-30"}))
            .with(EsgTable::Licenses, json!({"name": "LI Galpão", "status": "Ativa", "expiration_date": "2028-05-01"}))
            .with(EsgTable::Licenses, json!({"name": "Outorga", "status": "Vencida", "expiration_date": "2026-01-10"}))
            .with(EsgTable::Emissions, json!({"source_name": "Caldeira", "scope": 1, "total_co2e": 10.0}))
            .with(EsgTable::Emissions, json!({"source_name": "Energia", "scope": 2, "total_co2e": 4.5}))
            .with(EsgTable::Goals, json!({"name": "Reduzir CO2", "progress_percentage": 40.0, "status": "Em Andamento"}))
            .with(EsgTable::Goals, json!({"name": "Zero aterro", "progress_percentage": 100.0, "status": "Atingida"}))
            .with(EsgTable::NonConformities, json!({"title": "Vazamento", "status": "Aberta"}))
            .with(EsgTable::NonConformities, json!({"title": "Rótulo", "status": "Encerrada"}))
    }

    #[tokio::test]
    async fn licenses_question_on_dashboard() {
        let data = sample_data();
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver
            .resolve("Quais licenças estão vencendo?", data.company_id(), Some("dashboard"))
            .await;

        assert_eq!(resolved.topic, Some(Topic::Licenses));
        assert!(resolved.context.starts_with("Licenças:"), "{}", resolved.context);
        assert!(resolved.context.contains("3 cadastradas, 1 vencendo"));
        assert_eq!(resolved.relevant_data["licenses"].as_array().unwrap().len(), 3);
        assert_eq!(resolved.relevant_data["expiringLicenses"].as_array().unwrap().len(), 1);
        assert!(resolved.data_found());
    }

    #[tokio::test]
    async fn emissions_win_over_goals() {
        let data = sample_data();
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver
            .resolve("Estamos perto da meta de emissões?", data.company_id(), None)
            .await;

        assert!(resolved.context.starts_with("Emissões:"));
        assert!(resolved.context.contains("14.50 tCO2e"));
    }

    #[tokio::test]
    async fn emissions_scope_filter() {
        let data = sample_data();
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver.resolve("Detalhe o escopo 2", data.company_id(), None).await;

        assert_eq!(resolved.relevant_data["scopeFilter"], json!(2));
        assert_eq!(resolved.relevant_data["emissions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_topic_keyword_yields_its_label() {
        let data = sample_data();
        let resolver = ContextResolver::new(&data, today());

        for rule in crate::assistant::intent::INTENT_RULES {
            let message = format!("me fale sobre {}", rule.keywords[0]);
            let resolved = resolver.resolve(&message, data.company_id(), None).await;
            assert!(
                resolved.context.starts_with(rule.topic.label()),
                "{:?}: {}",
                rule.topic,
                resolved.context
            );
        }
    }

    #[tokio::test]
    async fn page_fallback_and_general_question() {
        let data = sample_data();
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver.resolve("Bom dia!", data.company_id(), Some("dashboard")).await;
        assert!(resolved.context.starts_with("Visão geral:"));
        assert!(resolved.context.contains("1 não conformidades abertas"));

        let resolved = resolver.resolve("Bom dia!", data.company_id(), Some("configuracoes")).await;
        assert_eq!(resolved.context, GENERAL_CONTEXT);
        assert!(!resolved.data_found());

        let resolved = resolver.resolve("Bom dia!", data.company_id(), None).await;
        assert_eq!(resolved.context, GENERAL_CONTEXT);
    }

    #[tokio::test]
    async fn capped_tables_are_flagged_in_context() {
        let data = (0..RECORD_LIMIT).fold(InMemoryEsgData::new(), |data, i| {
            data.with(EsgTable::Licenses, json!({"name": format!("Licença {i}"), "expiration_date": "2030-01-01"}))
        });
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver.resolve("licenças", data.company_id(), None).await;
        assert!(resolved.context.contains("500 cadastradas"), "{}", resolved.context);
        assert!(resolved.context.ends_with("(últimos 500 registros)"), "{}", resolved.context);
        assert_eq!(resolved.relevant_data["licenses"].as_array().unwrap().len(), PROMPT_SAMPLE);

        let small = sample_data();
        let resolved = ContextResolver::new(&small, today()).resolve("licenças", small.company_id(), None).await;
        assert!(!resolved.context.contains("últimos"));
    }

    #[tokio::test]
    async fn blank_page_falls_back_to_general() {
        let data = InMemoryEsgData::default();
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver.resolve("Bom dia!", data.company_id(), Some("")).await;
        assert_eq!(resolved.context, GENERAL_CONTEXT);
        assert_eq!(resolved.topic, None);
    }

    #[tokio::test]
    async fn data_errors_degrade_into_context() {
        let data = InMemoryEsgData::failing();
        let resolver = ContextResolver::new(&data, today());

        let resolved = resolver.resolve("licenças", data.company_id(), None).await;

        assert!(resolved.context.starts_with("Licenças: Erro ao buscar dados"));
        assert!(resolved.relevant_data.is_empty());
    }
}
