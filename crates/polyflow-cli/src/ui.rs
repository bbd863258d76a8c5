use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use polyflow::engine::progress::{Progress, ProgressCallback};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::debug;

const EVENT_BUFFER: usize = 1024;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

/// The workflow phase currently on screen.
struct Phase {
    name: String,
    bar: ProgressBar,
    started: Instant,
}

/// Renders workflow phases as a spinner that turns into an integration-step
/// bar once the phase announces a step count. Log lines print above it.
pub struct UiManager {
    mp: MultiProgress,
    phase: Option<Phase>,
    events: mpsc::Receiver<UiEvent>,
    shutdown: watch::Receiver<bool>,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, events) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_sender, shutdown) = watch::channel(false);
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let manager = Self {
            mp,
            phase: None,
            events,
            shutdown,
        };
        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
        if let Some(phase) = self.phase.take() {
            phase.bar.finish_and_clear();
        }
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(line) => self.print(line),
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn print(&self, line: String) {
        if self.mp.println(&line).is_err() {
            eprintln!("{}", line);
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                if let Some(previous) = self.phase.take() {
                    previous.bar.finish_and_clear();
                }
                let bar = self.mp.add(ProgressBar::new_spinner());
                bar.set_style(spinner_style());
                bar.set_message(name.clone());
                bar.enable_steady_tick(Duration::from_millis(100));
                self.phase = Some(Phase {
                    name,
                    bar,
                    started: Instant::now(),
                });
            }
            Progress::PhaseFinish => {
                if let Some(phase) = self.phase.take() {
                    phase.bar.finish_and_clear();
                    self.print(format!(
                        "✓ {} ({:.1}s)",
                        phase.name,
                        phase.started.elapsed().as_secs_f64()
                    ));
                }
            }
            Progress::TaskStart { total_steps } => {
                if let Some(phase) = &self.phase {
                    phase.bar.disable_steady_tick();
                    phase.bar.set_style(step_bar_style());
                    phase.bar.set_length(total_steps);
                    phase.bar.reset();
                }
            }
            Progress::TaskIncrement { steps } => {
                if let Some(phase) = &self.phase {
                    phase.bar.inc(steps);
                }
            }
            Progress::TaskFinish => {
                if let Some(phase) = &self.phase {
                    if let Some(total) = phase.bar.length() {
                        phase.bar.set_position(total);
                    }
                    phase.bar.finish();
                }
            }
            Progress::Message(text) => self.print(format!("  {}", text)),
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn step_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{msg:<24} {wide_bar:.cyan/blue} {human_pos}/{human_len} steps · {per_sec} · ETA {eta}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏ ")
}

/// Builds a core progress callback that forwards every event to the UI task.
///
/// Events are dropped, not awaited, when the channel is full.
pub fn progress_callback(sender: mpsc::Sender<UiEvent>) -> ProgressCallback<'static> {
    Box::new(move |progress: Progress| {
        if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
            debug!("Dropped progress event: {}", e);
        }
    })
}
