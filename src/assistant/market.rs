//! Market intelligence snippets attached to the prompt.
//!
//! The shipped implementation returns canned text picked by keyword. It sits
//! behind `MarketIntelligence` so a real search backend can replace it.

const MARKET_KEYWORDS: &[&str] = &[
    "mercado", "benchmark", "setor", "regulament", "tendência", "tendencia",
    "comparar", "concorr", "legislação", "legislacao",
];

const REGULATORY_KEYWORDS: &[&str] = &["regulament", "legisla", "norma"];
const BENCHMARK_KEYWORDS: &[&str] = &["benchmark", "comparar", "setor", "concorr"];
const TREND_KEYWORDS: &[&str] = &["tendência", "tendencia"];

const REGULATORY_INFO: &str = "Cenário regulatório: a Resolução CVM 193/2023 adota as normas IFRS S1 e S2 \
    para relatórios de sustentabilidade, com adoção obrigatória para companhias abertas a partir de 2026. \
    O Programa Brasileiro GHG Protocol segue como referência para inventários de emissões.";

const BENCHMARK_INFO: &str = "Benchmark setorial: empresas líderes em ESG no Brasil publicam inventário de GEE \
    verificado por terceira parte, mantêm taxa de reciclagem de resíduos acima de 70% e vinculam metas \
    ESG à remuneração variável da liderança.";

const TREND_INFO: &str = "Tendências de mercado: crescimento da demanda por dados de Escopo 3 na cadeia de \
    fornecedores, expansão do mercado regulado de carbono (SBCE) e maior exigência de investidores por \
    metas de descarbonização com base científica (SBTi).";

const GENERAL_MARKET_INFO: &str = "Contexto de mercado: investidores e clientes têm exigido maior transparência \
    em indicadores ESG, com foco em emissões, gestão de resíduos e governança corporativa.";

/// Source of the optional market snippet for a chat message.
pub trait MarketIntelligence: Send + Sync {
    fn lookup(&self, message: &str) -> Option<String>;
}

pub fn is_market_question(message: &str) -> bool {
    contains_any(&message.to_lowercase(), MARKET_KEYWORDS)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Keyword-selected canned snippets
#[derive(Debug, Default, Clone)]
pub struct StaticMarketIntel;

impl MarketIntelligence for StaticMarketIntel {
    fn lookup(&self, message: &str) -> Option<String> {
        if !is_market_question(message) {
            return None;
        }

        let lowered = message.to_lowercase();
        let snippet = if contains_any(&lowered, REGULATORY_KEYWORDS) {
            REGULATORY_INFO
        } else if contains_any(&lowered, BENCHMARK_KEYWORDS) {
            BENCHMARK_INFO
        } else if contains_any(&lowered, TREND_KEYWORDS) {
            TREND_INFO
        } else {
            GENERAL_MARKET_INFO
        };

        tracing::debug!("Attaching market snippet ({} chars)", snippet.len());
        Some(snippet.to_string())
    }
}
