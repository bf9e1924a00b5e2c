//! Demo binary: wires a [`paneloom::desktop::Desktop`] to a crossterm
//! screen driver and runs the single-task draw loop described in spec.md §5.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use paneloom::app::KeyCode;
use paneloom::apps::terminal::TerminalApp;
use paneloom::apps::welcome::WelcomeApp;
use paneloom::config::{EngineConfig, Theme};
use paneloom::desktop::Desktop;
use paneloom::driver::{CrosstermDriver, Event, ScreenDriver};
use paneloom::registry::AppRegistry;
use paneloom::storage::StorageService;

fn build_registry() -> AppRegistry {
    let mut registry = AppRegistry::new();
    registry.register(
        "shell",
        Arc::new(|_cfg| {
            Box::new(TerminalApp::spawn(None, 80, 24).expect("failed to spawn shell"))
                as Box<dyn paneloom::app::App>
        }),
    );
    registry.register("welcome", Arc::new(|_cfg| Box::new(WelcomeApp::new()) as Box<dyn paneloom::app::App>));
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base_dir = std::env::var("PANELOOM_HOME").unwrap_or_else(|_| ".".into());
    let storage = StorageService::new(base_dir, EngineConfig::default().flush_debounce_ms);

    let registry = build_registry();
    let mut desktop = Desktop::new(EngineConfig::default(), Theme::default(), registry);
    desktop.switch_workspace(1, || ("shell".into(), Box::new(TerminalApp::spawn(None, 80, 24).expect("spawn shell"))));

    let mut driver = CrosstermDriver::new();
    driver.init()?;
    driver.hide_cursor()?;

    let result = run_loop(&mut desktop, &mut driver, &storage).await;

    desktop.shutdown();
    driver.fini();
    storage.close()?;
    result
}

async fn run_loop(desktop: &mut Desktop, driver: &mut CrosstermDriver, storage: &StorageService) -> anyhow::Result<()> {
    let mut viewport = driver.size();
    desktop.recalculate_layout(viewport);

    loop {
        if desktop.is_quitting() {
            break;
        }

        match driver.poll_event(Duration::from_millis(33))? {
            Event::Resize(cols, rows) => {
                viewport = (cols, rows);
                desktop.recalculate_layout(viewport);
            }
            Event::Key(key) => {
                if key.code == KeyCode::Char && key.ch == Some('q') && key.mods.ctrl && key.mods.alt {
                    break;
                }
                desktop.handle_key(key);
            }
            Event::Mouse { x, y, buttons, mods } => {
                desktop.handle_mouse(x, y, buttons, mods);
                if !buttons.left && !buttons.right && !buttons.middle {
                    desktop.cancel_selection_on_button_loss();
                }
            }
            Event::MouseWheel { x, y, delta, .. } => desktop.handle_mouse_wheel(x, y, delta),
            Event::Paste(bytes) => {
                if let Some(ws) = desktop.active_workspace_mut() {
                    let active = ws.active_pane_handle();
                    if let Some(pane) = ws.pane_mut(active) {
                        if let Some(handler) = pane.app_mut().as_paste_handler() {
                            handler.handle_paste(&bytes);
                        }
                    }
                }
            }
            Event::Tick => {}
        }

        if storage.debounce_elapsed() {
            storage.flush()?;
        }

        let frame = desktop.render(viewport);
        for (y, row) in frame.rows().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                driver.set_content(x as u16, y as u16, cell.ch, cell.style);
            }
        }
        driver.show()?;
    }

    Ok(())
}
