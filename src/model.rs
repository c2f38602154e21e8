//! World geometry and the two entity kinds: the player's car and obstacles.
//!
//! Everything here is in world pixels on a fixed 480x700 field, y grows down.

pub(crate) const WIDTH: i32 = 480;
pub(crate) const HEIGHT: i32 = 700;

pub(crate) const LANE_COUNT: usize = 3;
pub(crate) const LANE_PADDING: i32 = 40;
const ROAD_SPAN: i32 = WIDTH - 2 * LANE_PADDING;

pub(crate) const CAR_WIDTH: i32 = 50;
pub(crate) const CAR_HEIGHT: i32 = 90;
pub(crate) const OBSTACLE_WIDTH: i32 = 50;
pub(crate) const OBSTACLE_HEIGHT: i32 = 90;

/// Gap between the player's bumper and the bottom of the field.
pub(crate) const PLAYER_BOTTOM_MARGIN: i32 = 20;
/// Upper bound of the random extra distance above the field a new obstacle starts at.
pub(crate) const SPAWN_JITTER: i32 = 100;

/// Center x of every lane, left to right.
pub(crate) const LANE_CENTERS: [i32; LANE_COUNT] = lane_centers();

const fn lane_centers() -> [i32; LANE_COUNT] {
    let mut out = [0; LANE_COUNT];
    let mut i = 0;
    while i < LANE_COUNT {
        out[i] = LANE_PADDING + ROAD_SPAN * (2 * i as i32 + 1) / (2 * LANE_COUNT as i32);
        i += 1;
    }
    out
}

/// X of the divider line to the left of `lane` (lane 0 has none, so 1..LANE_COUNT).
pub(crate) fn lane_divider_x(lane: usize) -> i32 {
    LANE_PADDING + ROAD_SPAN * lane as i32 / LANE_COUNT as i32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rect {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) w: i32,
    pub(crate) h: i32,
}

impl Rect {
    pub(crate) fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub(crate) fn left(&self) -> i32 {
        self.x
    }
    pub(crate) fn right(&self) -> i32 {
        self.x + self.w
    }
    pub(crate) fn top(&self) -> i32 {
        self.y
    }
    pub(crate) fn bottom(&self) -> i32 {
        self.y + self.h
    }
    pub(crate) fn center_x(&self) -> i32 {
        self.x + self.w / 2
    }

    pub(crate) fn set_center_x(&mut self, cx: i32) {
        self.x = cx - self.w / 2;
    }
    pub(crate) fn set_bottom(&mut self, bottom: i32) {
        self.y = bottom - self.h;
    }

    /// True when the two rects share a positive area. Touching edges do not count.
    pub(crate) fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Player {
    pub(crate) lane: usize,
    pub(crate) rect: Rect,
    pub(crate) alive: bool,
}

impl Player {
    pub(crate) fn new() -> Self {
        let mut p = Self {
            lane: LANE_COUNT / 2,
            rect: Rect::new(0, 0, CAR_WIDTH, CAR_HEIGHT),
            alive: true,
        };
        p.update_pos();
        p
    }

    fn update_pos(&mut self) {
        assert!(self.lane < LANE_COUNT, "player lane {} out of range", self.lane);
        self.rect.set_center_x(LANE_CENTERS[self.lane]);
        self.rect.set_bottom(HEIGHT - PLAYER_BOTTOM_MARGIN);
    }

    /// Returns true if the car actually changed lane.
    pub(crate) fn move_left(&mut self) -> bool {
        if self.lane == 0 {
            return false;
        }
        self.lane -= 1;
        self.update_pos();
        true
    }

    pub(crate) fn move_right(&mut self) -> bool {
        if self.lane + 1 >= LANE_COUNT {
            return false;
        }
        self.lane += 1;
        self.update_pos();
        true
    }
}

/// Cosmetic paint of an obstacle; drawn from a fixed two-color palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ObstacleColor {
    Red,
    Green,
}

#[derive(Clone, Debug)]
pub(crate) struct Obstacle {
    pub(crate) lane: usize,
    pub(crate) rect: Rect,
    /// World pixels per tick.
    pub(crate) speed: i32,
    pub(crate) color: ObstacleColor,
}

impl Obstacle {
    /// Places a new obstacle fully above the field, `jitter` extra pixels higher.
    pub(crate) fn new(lane: usize, speed: i32, jitter: i32, color: ObstacleColor) -> Self {
        assert!(lane < LANE_COUNT, "obstacle lane {lane} out of range");
        let mut rect = Rect::new(0, 0, OBSTACLE_WIDTH, OBSTACLE_HEIGHT);
        rect.set_center_x(LANE_CENTERS[lane]);
        rect.y = -OBSTACLE_HEIGHT - jitter;
        Self {
            lane,
            rect,
            speed,
            color,
        }
    }

    pub(crate) fn advance(&mut self) {
        self.rect.y += self.speed;
    }

    /// Top edge has passed the bottom of the field.
    pub(crate) fn has_exited(&self) -> bool {
        self.rect.top() > HEIGHT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    Paused,
    GameOver,
}
