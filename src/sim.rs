use crate::difficulty::{speed_for_score, spawn_interval_ms};
use crate::model::{Obstacle, ObstacleColor, Phase, Player, LANE_COUNT, SPAWN_JITTER};
use rand::Rng;
use std::time::Duration;

/// Fixed simulation step: one tick at 60 Hz.
pub(crate) const TICK: Duration = Duration::from_nanos(1_000_000_000 / 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlayerAction {
    MoveLeft,
    MoveRight,
    TogglePause,
    Restart,
    Quit,
}

/// What the session loop should do after an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Restart,
    Quit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TickReport {
    /// Lane of the obstacle spawned this tick.
    pub(crate) spawned: Option<usize>,
    pub(crate) scored: u32,
    pub(crate) collided: bool,
}

/// One play-through: from a fresh car on an empty road until game over.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub(crate) player: Player,
    pub(crate) obstacles: Vec<Obstacle>,
    pub(crate) score: u32,
    pub(crate) phase: Phase,
    spawn_elapsed: Duration,
    spawn_interval: Duration,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            player: Player::new(),
            obstacles: Vec::new(),
            score: 0,
            phase: Phase::Running,
            spawn_elapsed: Duration::ZERO,
            spawn_interval: Duration::from_millis(spawn_interval_ms(0)),
        }
    }

    pub(crate) fn spawn_interval(&self) -> Duration {
        self.spawn_interval
    }

    pub(crate) fn apply(&mut self, action: PlayerAction) -> Flow {
        match action {
            PlayerAction::Quit => return Flow::Quit,
            PlayerAction::Restart => {
                if self.phase == Phase::GameOver {
                    return Flow::Restart;
                }
            }
            PlayerAction::TogglePause => {
                if self.player.alive {
                    self.phase = match self.phase {
                        Phase::Running => Phase::Paused,
                        Phase::Paused => Phase::Running,
                        Phase::GameOver => Phase::GameOver,
                    };
                }
            }
            PlayerAction::MoveLeft => {
                if self.can_steer() {
                    self.player.move_left();
                }
            }
            PlayerAction::MoveRight => {
                if self.can_steer() {
                    self.player.move_right();
                }
            }
        }
        Flow::Continue
    }

    fn can_steer(&self) -> bool {
        self.phase == Phase::Running && self.player.alive
    }

    /// Advance one fixed step. Does nothing unless running.
    ///
    /// A score change recomputes the spawn interval but keeps the countdown
    /// already accumulated; only a spawn resets it. Restarting the countdown on
    /// every exit would keep postponing spawns once exits come faster than the
    /// interval.
    pub(crate) fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> TickReport {
        let mut report = TickReport::default();
        if self.phase != Phase::Running {
            return report;
        }

        // spawn timer
        self.spawn_elapsed += TICK;
        if self.spawn_elapsed >= self.spawn_interval {
            self.spawn_elapsed = Duration::ZERO;
            let ob = spawn_obstacle(rng, self.score);
            report.spawned = Some(ob.lane);
            self.obstacles.push(ob);
        }

        for ob in &mut self.obstacles {
            ob.advance();
        }

        // obstacles past the bottom edge score once and are dropped
        let before = self.obstacles.len();
        self.obstacles.retain(|ob| !ob.has_exited());
        let exited = (before - self.obstacles.len()) as u32;
        if exited > 0 {
            self.score += exited;
            self.spawn_interval = Duration::from_millis(spawn_interval_ms(self.score));
            report.scored = exited;
        }

        let player_rect = self.player.rect;
        if self.obstacles.iter().any(|ob| ob.rect.intersects(&player_rect)) {
            self.player.alive = false;
            self.phase = Phase::GameOver;
            report.collided = true;
        }

        report
    }
}

/// Build an obstacle in a random lane at the current difficulty.
pub(crate) fn spawn_obstacle<R: Rng + ?Sized>(rng: &mut R, score: u32) -> Obstacle {
    let lane = rng.gen_range(0..LANE_COUNT);
    let jitter = rng.gen_range(0..=SPAWN_JITTER);
    let color = if rng.gen_bool(0.5) {
        ObstacleColor::Red
    } else {
        ObstacleColor::Green
    };
    Obstacle::new(lane, speed_for_score(score), jitter, color)
}
