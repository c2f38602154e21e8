use crate::config::{load_settings, project_paths, save_settings_atomic, Settings, SettingsSource};
use crate::input::{collect_input_nonblocking, map_key_to_action, InputEvent};
use crate::logging;
use crate::render::{draw_frame, Terminal};
use crate::sim::{Flow, Session, TICK};
use rand::{rngs::StdRng, SeedableRng};
use std::time::{Duration, Instant};

/// Longest wall-clock gap fed into the tick accumulator in one frame,
/// unless the frame cap itself is slower than this.
const MAX_FRAME_DT: Duration = Duration::from_millis(50);

/// Program-lifetime context: everything that survives a restart.
pub(crate) struct App {
    settings: Settings,
    term: Terminal,
    rng: StdRng,
    started: Instant,
}

impl App {
    fn run_sessions(&mut self) -> anyhow::Result<()> {
        let mut round = 0u32;
        loop {
            round += 1;
            log::info!("round {round} started");
            let mut session = Session::new();
            match self.play(&mut session)? {
                Flow::Restart => {
                    log::info!("round {round} restarted after scoring {}", session.score);
                }
                Flow::Quit | Flow::Continue => {
                    log::info!("quit in round {round} with score {}", session.score);
                    return Ok(());
                }
            }
        }
    }

    /// Drive one session until it asks to restart or quit.
    fn play(&mut self, session: &mut Session) -> anyhow::Result<Flow> {
        let frame_dt = frame_time(self.settings.fps());

        let mut last_frame = Instant::now();
        let mut sim_accum = Duration::ZERO;

        loop {
            let frame_start = Instant::now();
            if self.term.resize_if_needed()? {
                log::debug!("terminal resized to {}x{}", self.term.cols, self.term.rows);
            }

            // input
            for ev in collect_input_nonblocking(frame_dt)? {
                match ev {
                    InputEvent::Resize(w, h) => {
                        if self.term.resize(w, h) {
                            log::debug!("terminal resized to {w}x{h}");
                        }
                    }
                    InputEvent::Key { key, mods } => {
                        let Some(action) = map_key_to_action(key, mods) else {
                            continue;
                        };
                        log::trace!("action {action:?} in {:?}", session.phase);
                        match session.apply(action) {
                            Flow::Continue => {}
                            flow => return Ok(flow),
                        }
                    }
                }
            }

            // sim fixed-step
            let now = Instant::now();
            let real_dt = clamp_frame_dt(now.saturating_duration_since(last_frame), frame_dt);
            last_frame = now;
            sim_accum = sim_accum.saturating_add(real_dt);

            while sim_accum >= TICK {
                sim_accum -= TICK;
                let report = session.tick(&mut self.rng);
                if let Some(lane) = report.spawned {
                    log::trace!(
                        "obstacle in lane {lane}, next in {:?}",
                        session.spawn_interval()
                    );
                }
                if report.scored > 0 {
                    log::debug!("score {}", session.score);
                }
                if report.collided {
                    log::info!("game over, final score {}", session.score);
                }
            }

            // render
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            draw_frame(&mut self.term.cur, session, elapsed_ms, self.settings.enable_color);
            self.term.present()?;

            // frame cap
            spin_sleep(frame_dt, frame_start);
        }
    }
}

pub(crate) fn run() -> anyhow::Result<()> {
    let paths = project_paths()?;
    let (settings, source) = load_settings(&paths.settings_path);

    if let Err(e) = logging::init(&paths.log_path, &settings.log_filter) {
        eprintln!("logging disabled: {e:#}");
    }

    match source {
        SettingsSource::File => {
            log::info!("settings loaded from {}", paths.settings_path.display())
        }
        SettingsSource::Missing => {
            log::info!("no settings file, writing defaults");
            if let Err(e) = save_settings_atomic(&paths.settings_path, &settings) {
                log::warn!("could not write default settings: {e:#}");
            }
        }
        SettingsSource::Invalid(err) => {
            log::warn!(
                "ignoring unreadable settings {}: {err}",
                paths.settings_path.display()
            );
        }
    }

    let seed = if settings.seed == 0 {
        rand::random()
    } else {
        settings.seed
    };
    log::info!("starting with seed {seed:#x}, {} fps", settings.fps());

    let term = Terminal::begin()?;
    let mut app = App {
        settings,
        term,
        rng: StdRng::seed_from_u64(seed),
        started: Instant::now(),
    };

    let res = app.run_sessions();
    // restore the terminal even if the loop failed
    let restored = app.term.end();
    res?;
    restored
}

/* -----------------------------
   Frame pacing helpers
------------------------------ */

fn frame_time(fps: u32) -> Duration {
    Duration::from_secs_f32(1.0 / fps as f32)
}

/// Cap a stall so it cannot unleash a burst of catch-up ticks. The cap never
/// drops below two frames, so slow frame caps still run the sim at full rate.
fn clamp_frame_dt(real_dt: Duration, frame_dt: Duration) -> Duration {
    real_dt.min(MAX_FRAME_DT.max(frame_dt * 2))
}

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed one second of evenly paced frames through the accumulator.
    fn ticks_in_one_second(fps: u32) -> u32 {
        let frame_dt = frame_time(fps);
        let mut acc = Duration::ZERO;
        let mut ticks = 0;
        for _ in 0..fps {
            acc += clamp_frame_dt(frame_dt, frame_dt);
            while acc >= TICK {
                acc -= TICK;
                ticks += 1;
            }
        }
        ticks
    }

    #[test]
    fn test_sim_rate_independent_of_fps_cap() {
        for fps in [10, 30, 60] {
            assert_eq!(ticks_in_one_second(fps), 60, "fps_cap={fps}");
        }
    }

    #[test]
    fn test_slowest_fps_cap_is_not_clamped() {
        let frame_dt = frame_time(10);
        assert_eq!(clamp_frame_dt(frame_dt, frame_dt), frame_dt);
    }

    #[test]
    fn test_stall_is_clamped() {
        let frame_dt = frame_time(60);
        assert_eq!(
            clamp_frame_dt(Duration::from_secs(5), frame_dt),
            MAX_FRAME_DT
        );
        assert_eq!(
            clamp_frame_dt(Duration::from_secs(5), frame_time(10)),
            frame_time(10) * 2
        );
    }
}
