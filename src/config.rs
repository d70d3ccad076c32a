//! Configuração do IAF carregada a partir de `iaf.toml`.
//!
//! A struct [`IafConfig`] contém os parâmetros ajustáveis do motor.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `IAF_LOG` tem precedência sobre o nível de log do arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::tracker::WeightedScoring;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "iaf.toml";

/// Configuração de nível superior carregada de `iaf.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct IafConfig {
    /// Filtro de log no formato do `tracing_subscriber::EnvFilter`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Número de tentativas por camada usado pelos workflows embutidos.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    /// Pesos da política de pontuação padrão.
    #[serde(default)]
    pub scoring: WeightedScoring,
}

// Valor padrão para o nível de log: "info".
fn default_log_level() -> String {
    "info".to_string()
}

// Valor padrão para tentativas por camada: 3.
fn default_max_attempts() -> u32 {
    3
}

impl Default for IafConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_max_attempts: default_max_attempts(),
            scoring: WeightedScoring::default(),
        }
    }
}

impl IafConfig {
    /// Carrega a configuração de `iaf.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<IafConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para o nível de log.
        if let Ok(level) = std::env::var("IAF_LOG")
            && !level.is_empty()
        {
            config.log_level = level;
        }

        Ok(config)
    }
}
