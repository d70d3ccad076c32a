//! Interface de terminal do IAF — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`TerminalProgress`] recebe os eventos de
//! progresso do motor e os exibe no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::{ProgressEvent, ProgressSink, ProgressStatus};
use crate::state_machine::{LayerState, WorkflowOutcome};

/// Indicador visual de progresso para a execução de um workflow no terminal.
///
/// Exibe um spinner animado durante as tentativas e mensagens coloridas
/// para camadas concluídas (verde), falhas (vermelho) e tentativas (amarelo).
pub struct TerminalProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para tentativas em andamento.
    yellow: Style,
}

impl TerminalProgress {
    /// Inicia o spinner com o nome do workflow.
    pub fn start(workflow: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("workflow: {workflow}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado final do workflow.
    pub fn finish(&self, outcome: &WorkflowOutcome) {
        self.pb.finish_and_clear();
        if outcome.success {
            println!(
                "  {} Workflow succeeded after {} attempt(s)",
                self.green.apply_to("✓"),
                outcome.total_attempts
            );
        } else {
            println!(
                "  {} Workflow failed after {} attempt(s)",
                self.red.apply_to("✗"),
                outcome.total_attempts
            );
        }
    }

    /// Imprime o resultado completo em JSON com um cabeçalho colorido.
    pub fn print_outcome(&self, outcome: &WorkflowOutcome) {
        let style = if outcome.success { &self.green } else { &self.red };
        println!();
        println!("{}", style.apply_to("─── Workflow Outcome ───"));
        for layer in &outcome.layer_outcomes {
            let marker = match layer.state {
                LayerState::Succeeded => self.green.apply_to("✓"),
                LayerState::Escalated => self.yellow.apply_to("↑"),
                _ => self.red.apply_to("✗"),
            };
            let pattern = layer
                .detected_pattern
                .as_ref()
                .map(|p| format!(" [{}]", p.name))
                .unwrap_or_default();
            println!(
                "  {marker} {} — {} attempt(s), {}{pattern}",
                layer.layer, layer.attempts_made, layer.state
            );
        }
        println!(
            "{}",
            serde_json::to_string_pretty(outcome).unwrap_or_default()
        );
    }
}

impl ProgressSink for TerminalProgress {
    fn notify(&self, event: &ProgressEvent) {
        match event.status {
            ProgressStatus::Started => self.pb.set_message(event.message.clone()),
            ProgressStatus::Progress => self.pb.set_message(format!(
                "{}: {}",
                event.layer,
                self.yellow.apply_to(&event.message)
            )),
            ProgressStatus::Completed => self
                .pb
                .println(format!("  {} {}", self.green.apply_to("✓"), event.message)),
            ProgressStatus::Failed => self
                .pb
                .println(format!("  {} {}", self.red.apply_to("✗"), event.message)),
        }
    }
}
