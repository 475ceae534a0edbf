//! Optional alternate-screen terminal visualizer.
//!
//! Renders a periodically refreshed table of every stage's name, worker
//! count, queue depth, and lifecycle state. It only ever reads through
//! `StageHandle`'s read-only introspection methods — it has no way to
//! mutate a stage's worker pool or routing.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use tokio_util::sync::CancellationToken;

use crate::stage::StageHandle;

const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Drives the alternate-screen render loop until `kill` is engaged.
pub async fn run<T>(handles: Vec<StageHandle<T>>, kill: CancellationToken) {
    let mut stdout = io::stdout();
    if enable_raw_mode().is_err() {
        tracing::warn!("visualizer could not enter raw mode, skipping render loop");
        return;
    }
    let _ = execute!(stdout, EnterAlternateScreen, Hide);

    loop {
        if kill.is_cancelled() {
            break;
        }
        render(&mut stdout, &handles);
        tokio::select! {
            _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
            _ = kill.cancelled() => break,
        }
    }

    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

fn render<T>(stdout: &mut io::Stdout, handles: &[StageHandle<T>]) {
    let _ = execute!(stdout, MoveTo(0, 0), Clear(ClearType::All));
    let _ = writeln!(stdout, "stage                workers  queue  state      downstream\r");
    let _ = writeln!(stdout, "-----                -------  -----  -----      ----------\r");
    for handle in handles {
        let downstream: Vec<&str> = handle.downstream().collect();
        let _ = writeln!(
            stdout,
            "{:<20} {:>7}  {:>5}  {:<10} {}\r",
            handle.name(),
            handle.worker_count(),
            handle.queue_depth(),
            format!("{:?}", handle.state()),
            downstream.join(", "),
        );
    }
    let _ = stdout.flush();
}
