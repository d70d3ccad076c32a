//! Interface de linha de comando do IAF baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (check, demo)
//! e flags globais (--max-attempts, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// IAF — motor iterativo de execução em camadas com tentativas pontuadas.
#[derive(Debug, Parser)]
#[command(name = "iaf", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Substitui o número máximo de tentativas de todas as camadas.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Valida um arquivo de workflow (TOML ou JSON) sem executá-lo.
    Check {
        /// Caminho para o arquivo de definição do workflow.
        file: PathBuf,
    },

    /// Executa a demonstração embutida de um workflow de duas camadas.
    Demo {
        /// Imprime o resultado completo em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
