//! Keyword routing for the chat assistant.
//!
//! `INTENT_RULES` is walked in order and the first topic with a keyword hit
//! wins. There is no scoring: precedence is the table order.

use serde::Serialize;

/// Context used when neither the message nor the page points to a topic.
pub const GENERAL_CONTEXT: &str =
    "Pergunta geral sobre ESG e sustentabilidade, sem dados específicos da empresa.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Licenses,
    Emissions,
    Goals,
    Waste,
    Energy,
    Water,
    NonConformities,
    Compliance,
    Risks,
    Opportunities,
    Audits,
    Documents,
    Employees,
    Stakeholders,
    Suppliers,
    Reports,
    Overview,
}

impl Topic {
    /// Prefix of every context string produced for this topic
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Licenses => "Licenças:",
            Topic::Emissions => "Emissões:",
            Topic::Goals => "Metas:",
            Topic::Waste => "Resíduos:",
            Topic::Energy => "Energia:",
            Topic::Water => "Água:",
            Topic::NonConformities => "Não conformidades:",
            Topic::Compliance => "Tarefas de compliance:",
            Topic::Risks => "Riscos:",
            Topic::Opportunities => "Oportunidades:",
            Topic::Audits => "Auditorias:",
            Topic::Documents => "Documentos:",
            Topic::Employees => "Colaboradores:",
            Topic::Stakeholders => "Stakeholders:",
            Topic::Suppliers => "Fornecedores:",
            Topic::Reports => "Desempenho ESG:",
            Topic::Overview => "Visão geral:",
        }
    }
}

pub struct IntentRule {
    pub topic: Topic,
    pub keywords: &'static [&'static str],
}

/// Ordered keyword table. Keywords are matched as lower-case substrings.
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule { topic: Topic::Licenses, keywords: &["licen", "venc", "expi"] },
    IntentRule { topic: Topic::Emissions, keywords: &["emiss", "carbon", "co2", "ghg", "escopo", "gee"] },
    IntentRule { topic: Topic::Goals, keywords: &["meta", "objetivo", "target"] },
    IntentRule { topic: Topic::Waste, keywords: &["resíduo", "residuo", "lixo", "recicla", "waste"] },
    IntentRule { topic: Topic::Energy, keywords: &["energia", "eletric", "elétric", "kwh"] },
    IntentRule { topic: Topic::Water, keywords: &["água", "agua", "hídric", "hidric"] },
    // Before compliance: "não conformidade" contains "conformidade".
    IntentRule {
        topic: Topic::NonConformities,
        keywords: &["não conformidade", "nao conformidade", "não-conformidade", "inconformidade", "desvio"],
    },
    IntentRule { topic: Topic::Compliance, keywords: &["tarefa", "compliance", "conformidade", "obrigaç", "obrigac"] },
    IntentRule { topic: Topic::Risks, keywords: &["risco", "risk"] },
    IntentRule { topic: Topic::Opportunities, keywords: &["oportunidade", "opportunit"] },
    IntentRule { topic: Topic::Audits, keywords: &["auditori", "audit"] },
    IntentRule { topic: Topic::Documents, keywords: &["document", "arquivo"] },
    IntentRule {
        topic: Topic::Employees,
        keywords: &["funcionári", "funcionari", "colaborador", "diversidade", "social"],
    },
    IntentRule {
        topic: Topic::Stakeholders,
        keywords: &["stakeholder", "parte interessada", "partes interessadas"],
    },
    IntentRule { topic: Topic::Suppliers, keywords: &["fornecedor", "supplier"] },
    IntentRule {
        topic: Topic::Reports,
        keywords: &["relatório", "relatorio", "report", "score", "pontuação", "pontuacao", "desempenho"],
    },
];

/// First topic whose keywords appear in the message.
pub fn match_topic(message: &str) -> Option<Topic> {
    let lowered = message.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|rule| rule.topic)
}

/// Default topic for the page the user is looking at.
pub fn page_topic(current_page: &str) -> Option<Topic> {
    let page = current_page.trim().trim_start_matches('/').to_lowercase();
    let topic = match page.as_str() {
        "dashboard" => Topic::Overview,
        "licenciamento" | "licencas" => Topic::Licenses,
        "inventario-gee" | "emissoes" => Topic::Emissions,
        "metas" => Topic::Goals,
        "residuos" => Topic::Waste,
        "nao-conformidades" => Topic::NonConformities,
        "compliance" => Topic::Compliance,
        "gestao-riscos" | "riscos" => Topic::Risks,
        "auditoria" => Topic::Audits,
        "relatorios-integrados" | "relatorios" => Topic::Reports,
        _ => return None,
    };
    Some(topic)
}

/// Follow-up actions offered under the assistant's answer.
pub fn suggested_actions(topic: Option<Topic>) -> Vec<&'static str> {
    match topic {
        Some(Topic::Licenses) => vec!["Ver licenças próximas do vencimento", "Agendar renovação de licença", "Cadastrar nova licença"],
        Some(Topic::Emissions) => vec!["Ver inventário de GEE", "Comparar emissões por escopo", "Registrar nova fonte de emissão"],
        Some(Topic::Goals) => vec!["Ver progresso das metas", "Criar nova meta ESG", "Atualizar indicadores"],
        Some(Topic::Waste) => vec!["Registrar destinação de resíduos", "Ver taxa de reciclagem", "Emitir relatório de resíduos"],
        Some(Topic::Energy) => vec!["Ver consumo de energia", "Calcular intensidade energética"],
        Some(Topic::Water) => vec!["Ver consumo de água", "Registrar nova medição"],
        Some(Topic::NonConformities) => vec!["Ver não conformidades abertas", "Registrar nova não conformidade", "Definir plano de ação"],
        Some(Topic::Compliance) => vec!["Ver tarefas em atraso", "Criar tarefa de compliance"],
        Some(Topic::Risks) => vec!["Ver matriz de riscos", "Registrar novo risco"],
        Some(Topic::Opportunities) => vec!["Ver oportunidades ESG", "Registrar nova oportunidade"],
        Some(Topic::Audits) => vec!["Ver auditorias planejadas", "Criar modelo de auditoria"],
        Some(Topic::Documents) => vec!["Abrir repositório de documentos", "Enviar novo documento"],
        Some(Topic::Employees) => vec!["Ver indicadores sociais", "Analisar diversidade"],
        Some(Topic::Stakeholders) => vec!["Ver mapa de stakeholders", "Enviar comunicação"],
        Some(Topic::Suppliers) => vec!["Ver fornecedores", "Avaliar fornecedor"],
        Some(Topic::Reports) => vec!["Gerar relatório integrado", "Ver pontuação ESG"],
        Some(Topic::Overview) => vec!["Ver resumo do painel", "Ver licenças próximas do vencimento", "Ver progresso das metas"],
        None => vec!["Ver painel ESG", "Consultar licenças", "Consultar emissões"],
    }
}
