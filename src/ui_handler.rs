use crate::render::RenderRow;
use crate::ui_commands::UiCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Handles UI commands by drawing the overlay as text on stderr
pub fn handle_ui_commands(mut ui_rx: mpsc::UnboundedReceiver<UiCommand>) -> JoinHandle<()> {
    info!("UI command handler started");

    tokio::spawn(async move {
        while let Some(command) = ui_rx.recv().await {
            match command {
                UiCommand::Show { header, rows } => {
                    info!("Showing overlay with {} windows", rows.len());
                    eprintln!("\n=== {} ===", header);
                    print_rows(&rows);
                }
                UiCommand::Repaint { rows } => {
                    eprintln!();
                    print_rows(&rows);
                }
                UiCommand::Hide => {
                    info!("Hiding overlay");
                    eprintln!("=======================\n");
                }
                UiCommand::Notice { message } => {
                    eprintln!("NOTICE: {}", message);
                }
            }
        }

        info!("UI command handler stopped, channel closed");
    })
}

fn print_rows(rows: &[RenderRow]) {
    for row in rows {
        eprintln!("{} {}", row.highlight.marker(), row);
    }
}
