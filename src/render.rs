use crate::model::{
    lane_divider_x, Obstacle, ObstacleColor, Phase, Player, Rect, HEIGHT, LANE_COUNT,
    LANE_PADDING, WIDTH,
};
use crate::sim::Session;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
    },
};
use std::cmp::{max, min};
use std::io::{self, Write};

pub(crate) const TITLE: &str = "Car Dodger";
pub(crate) const HUD_ROWS: u16 = 2;

const MIN_COLS: u16 = 20;
const MIN_PLAY_ROWS: u16 = 8;

/// Width of the dark strip on each side of the road.
const SHOULDER: i32 = LANE_PADDING - 10;
const DASH_LEN: i32 = 30;
const DASH_GAP: i32 = 20;
const DASH_WIDTH: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            *c = Cell {
                ch: ' ',
                fg: Color::White,
                bg,
            };
        }
    }
}

pub(crate) struct Terminal {
    out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    full_redraw: bool,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            SetTitle(TITLE),
            cursor::Hide,
            DisableLineWrap,
            Clear(ClearType::All)
        )?;
        restore_on_err(&mut out, terminal::enable_raw_mode())?;
        let (cols, rows) = restore_on_err(&mut out, terminal::size())?;

        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
            full_redraw: true,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize(&mut self, cols: u16, rows: u16) -> bool {
        if cols == self.cols && rows == self.rows {
            return false;
        }
        self.cols = cols;
        self.rows = rows;
        self.prev = CellBuffer::new(cols, rows);
        self.cur = CellBuffer::new(cols, rows);
        self.full_redraw = true;
        true
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        Ok(self.resize(c, r))
    }

    /// Flush cells that changed since the last present.
    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;
        if self.full_redraw {
            queue!(self.out, ResetColor, Clear(ClearType::All))?;
        }

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if !self.full_redraw && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        self.full_redraw = false;
        Ok(())
    }
}

/// Undo `Terminal::begin`'s screen setup when a later setup step fails,
/// since no `Terminal` exists yet to call `end` on.
fn restore_on_err<T, W: Write>(out: &mut W, res: io::Result<T>) -> anyhow::Result<T> {
    match res {
        Ok(v) => Ok(v),
        Err(e) => {
            let _ = terminal::disable_raw_mode();
            let _ = execute!(
                out,
                ResetColor,
                cursor::Show,
                EnableLineWrap,
                LeaveAlternateScreen
            );
            Err(e.into())
        }
    }
}

/* -----------------------------
   Colors
------------------------------ */

#[derive(Clone, Copy)]
struct Palette {
    backdrop: Color,
    shoulder: Color,
    road: Color,
    hud_fg: Color,
    hint_fg: Color,
    dash: Color,
    red: Color,
    green: Color,
    headlight: Color,
    car: Color,
    windshield: Color,
    banner: Color,
}

fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

fn palette(enable_color: bool) -> Palette {
    if enable_color {
        Palette {
            backdrop: rgb(30, 30, 30),
            shoulder: rgb(0, 0, 0),
            road: rgb(50, 50, 50),
            hud_fg: rgb(255, 255, 255),
            hint_fg: rgb(200, 200, 200),
            dash: rgb(255, 255, 255),
            red: rgb(200, 30, 30),
            green: rgb(30, 180, 30),
            headlight: rgb(240, 220, 80),
            car: rgb(30, 140, 220),
            windshield: rgb(200, 230, 255),
            banner: rgb(240, 220, 80),
        }
    } else {
        Palette {
            backdrop: Color::Black,
            shoulder: Color::Black,
            road: Color::Black,
            hud_fg: Color::White,
            hint_fg: Color::White,
            dash: Color::White,
            red: Color::White,
            green: Color::White,
            headlight: Color::White,
            car: Color::White,
            windshield: Color::White,
            banner: Color::White,
        }
    }
}

/* -----------------------------
   World -> braille layout
------------------------------ */

/// Placement of the 480x700 world inside the terminal, in braille sub-pixels
/// (2 per cell across, 4 per cell down) below the HUD.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Layout {
    pub(crate) cols: u16,
    pub(crate) play_y: u16,
    pub(crate) play_rows: u16,
    pub(crate) px_w: i32,
    pub(crate) px_h: i32,
    /// Sub-pixel column of world x = 0.
    pub(crate) field_x: i32,
    pub(crate) field_w: i32,
    pub(crate) field_h: i32,
    /// Sub-pixels per world pixel.
    pub(crate) scale: f32,
}

pub(crate) fn fit_layout(cols: u16, rows: u16) -> Option<Layout> {
    if cols < MIN_COLS || rows < HUD_ROWS + MIN_PLAY_ROWS {
        return None;
    }
    let play_rows = rows - HUD_ROWS;
    let px_w = cols as i32 * 2;
    let px_h = play_rows as i32 * 4;

    let scale = (px_w as f32 / WIDTH as f32).min(px_h as f32 / HEIGHT as f32);
    let field_w = ((WIDTH as f32 * scale).floor() as i32).clamp(1, px_w);
    let field_h = ((HEIGHT as f32 * scale).floor() as i32).clamp(1, px_h);

    Some(Layout {
        cols,
        play_y: HUD_ROWS,
        play_rows,
        px_w,
        px_h,
        field_x: (px_w - field_w) / 2,
        field_w,
        field_h,
        scale,
    })
}

/// Vertical offset of the first lane dash, scrolling with wall-clock time.
pub(crate) fn dash_offset(elapsed_ms: u64) -> i32 {
    let period = (DASH_LEN + DASH_GAP) as u64;
    -(((elapsed_ms / 6) % period) as i32)
}

// declared in draw priority order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Mat {
    Empty,
    Dash,
    Red,
    Green,
    Headlight,
    Car,
    Windshield,
}

fn fg_for_mat(p: &Palette, m: Mat) -> Color {
    match m {
        Mat::Empty => p.hud_fg,
        Mat::Dash => p.dash,
        Mat::Red => p.red,
        Mat::Green => p.green,
        Mat::Headlight => p.headlight,
        Mat::Car => p.car,
        Mat::Windshield => p.windshield,
    }
}

struct Canvas {
    layout: Layout,
    mats: Vec<Mat>,
}

impl Canvas {
    fn new(layout: Layout) -> Self {
        Self {
            layout,
            mats: vec![Mat::Empty; (layout.px_w as usize) * (layout.px_h as usize)],
        }
    }

    /// Rasterize a world rect, clipped to the field. Higher materials win.
    fn fill_world(&mut self, r: Rect, m: Mat) {
        let l = self.layout;
        let x0 = l.field_x + (r.left() as f32 * l.scale).floor() as i32;
        let x1 = l.field_x + (r.right() as f32 * l.scale).ceil() as i32;
        let y0 = (r.top() as f32 * l.scale).floor() as i32;
        let y1 = (r.bottom() as f32 * l.scale).ceil() as i32;

        for y in max(0, y0)..min(l.field_h, y1) {
            let row = y * l.px_w;
            for x in max(l.field_x, x0)..min(l.field_x + l.field_w, x1) {
                let i = (row + x) as usize;
                if m >= self.mats[i] {
                    self.mats[i] = m;
                }
            }
        }
    }

    fn draw_lane_dashes(&mut self, elapsed_ms: u64) {
        let offset = dash_offset(elapsed_ms);
        for lane in 1..LANE_COUNT {
            let x = lane_divider_x(lane) - DASH_WIDTH / 2;
            let mut y = offset;
            while y < HEIGHT {
                self.fill_world(Rect::new(x, y, DASH_WIDTH, DASH_LEN), Mat::Dash);
                y += DASH_LEN + DASH_GAP;
            }
        }
    }

    fn draw_obstacle(&mut self, ob: &Obstacle) {
        let r = ob.rect;
        let body = match ob.color {
            ObstacleColor::Red => Mat::Red,
            ObstacleColor::Green => Mat::Green,
        };
        self.fill_world(r, body);
        // headlights
        let hl_w = 8;
        self.fill_world(Rect::new(r.left() + 8, r.bottom() - 18, hl_w, 6), Mat::Headlight);
        self.fill_world(
            Rect::new(r.right() - 8 - hl_w, r.bottom() - 18, hl_w, 6),
            Mat::Headlight,
        );
    }

    fn draw_player(&mut self, p: &Player) {
        let r = p.rect;
        self.fill_world(r, Mat::Car);
        self.fill_world(Rect::new(r.center_x() - 12, r.top() + 12, 24, 18), Mat::Windshield);
    }

    fn background_at(&self, pal: &Palette, px: i32, py: i32) -> Color {
        let l = self.layout;
        if py >= l.field_h || px < l.field_x || px >= l.field_x + l.field_w {
            return pal.backdrop;
        }
        let world_x = ((px - l.field_x) as f32 / l.scale) as i32;
        if world_x < SHOULDER || world_x >= WIDTH - SHOULDER {
            pal.shoulder
        } else {
            pal.road
        }
    }

    fn pack_into(&self, buf: &mut CellBuffer, pal: &Palette) {
        let l = self.layout;
        for by in 0..l.play_rows as i32 {
            for bx in 0..l.cols as i32 {
                let px0 = bx * 2;
                let py0 = by * 4;

                let mut dots: u8 = 0;
                let mut best = Mat::Empty;
                for dy in 0..4 {
                    for dx in 0..2 {
                        let px = px0 + dx;
                        let py = py0 + dy;
                        if px >= l.px_w || py >= l.px_h {
                            continue;
                        }
                        let m = self.mats[(py * l.px_w + px) as usize];
                        if m != Mat::Empty {
                            dots |= braille_bit(dx, dy);
                            best = max(best, m);
                        }
                    }
                }

                let ch = if dots == 0 { ' ' } else { braille_char(dots) };
                buf.set(
                    bx as u16,
                    l.play_y + by as u16,
                    Cell {
                        ch,
                        fg: fg_for_mat(pal, best),
                        bg: self.background_at(pal, px0 + 1, py0 + 2),
                    },
                );
            }
        }
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: i32, dy: i32) -> u8 {
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

fn braille_char(dots: u8) -> char {
    char::from_u32(0x2800 + dots as u32).unwrap_or(' ')
}

/* -----------------------------
   Text, HUD, overlays
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

fn draw_centered(buf: &mut CellBuffer, y: u16, s: &str, fg: Color, bg: Color) {
    let len = s.chars().count() as u16;
    let x = buf.w.saturating_sub(len) / 2;
    draw_text(buf, x, y, s, fg, bg);
}

fn draw_hud(buf: &mut CellBuffer, session: &Session, pal: &Palette) {
    let bg = Color::Black;
    draw_text(buf, 1, 0, &format!("Score: {}", session.score), pal.hud_fg, bg);
    draw_text(
        buf,
        1,
        1,
        "P/Space pause  ←/→ or A/D move  R restart  Esc quit",
        pal.hint_fg,
        bg,
    );
}

/// Boxed message centered on screen; each line keeps its own color.
fn draw_center_box(buf: &mut CellBuffer, lines: &[(&str, Color)], pal: &Palette) {
    let bg = Color::Black;
    let inner = lines.iter().map(|(s, _)| s.chars().count()).max().unwrap_or(0) as u16;
    let bw = min(inner + 4, buf.w);
    let bh = min(lines.len() as u16 + 2, buf.h);
    if bw < 2 || bh < 2 {
        return;
    }
    let x0 = (buf.w - bw) / 2;
    let y0 = (buf.h - bh) / 2;

    let edge = |ch| Cell {
        ch,
        fg: pal.hud_fg,
        bg,
    };
    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            buf.set(x, y, edge(' '));
        }
    }
    for x in x0..x0 + bw {
        buf.set(x, y0, edge('─'));
        buf.set(x, y0 + bh - 1, edge('─'));
    }
    for y in y0..y0 + bh {
        buf.set(x0, y, edge('│'));
        buf.set(x0 + bw - 1, y, edge('│'));
    }
    buf.set(x0, y0, edge('┌'));
    buf.set(x0 + bw - 1, y0, edge('┐'));
    buf.set(x0, y0 + bh - 1, edge('└'));
    buf.set(x0 + bw - 1, y0 + bh - 1, edge('┘'));

    for (i, (line, fg)) in lines.iter().enumerate() {
        let y = y0 + 1 + i as u16;
        if y >= y0 + bh - 1 {
            break;
        }
        let pad = (inner - line.chars().count() as u16) / 2;
        draw_text(buf, x0 + 2 + pad, y, line, *fg, bg);
    }
}

/// Compose one full frame into `buf`. Pure with respect to the session.
pub(crate) fn draw_frame(
    buf: &mut CellBuffer,
    session: &Session,
    elapsed_ms: u64,
    enable_color: bool,
) {
    let pal = palette(enable_color);
    buf.clear(Color::Black);

    draw_hud(buf, session, &pal);

    let Some(layout) = fit_layout(buf.w, buf.h) else {
        draw_text(
            buf,
            0,
            buf.h.saturating_sub(1),
            "Terminal too small",
            pal.hud_fg,
            Color::Black,
        );
        return;
    };

    let mut canvas = Canvas::new(layout);
    canvas.draw_lane_dashes(elapsed_ms);
    for ob in &session.obstacles {
        canvas.draw_obstacle(ob);
    }
    canvas.draw_player(&session.player);
    canvas.pack_into(buf, &pal);

    match session.phase {
        Phase::Running => {}
        Phase::Paused => {
            let y = layout.play_y + layout.play_rows / 2;
            draw_centered(buf, y, "  PAUSED  ", pal.banner, Color::Black);
        }
        Phase::GameOver => {
            let score = format!("Final Score: {}", session.score);
            draw_center_box(
                buf,
                &[
                    ("GAME OVER", pal.red),
                    ("", pal.hud_fg),
                    (score.as_str(), pal.hud_fg),
                    ("Press R to play again or ESC to quit", pal.hint_fg),
                ],
                &pal,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn row_text(buf: &CellBuffer, y: u16) -> String {
        (0..buf.w).map(|x| buf.cells[buf.idx(x, y)].ch).collect()
    }

    fn screen_text(buf: &CellBuffer) -> String {
        (0..buf.h)
            .map(|y| row_text(buf, y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── Layout ──

    #[test]
    fn test_layout_fits_inside_terminal() {
        for &(cols, rows) in &[(20, 10), (80, 24), (120, 40), (300, 30), (40, 100)] {
            let l = fit_layout(cols, rows).expect("size should fit");
            assert!(l.field_x >= 0);
            assert!(l.field_x + l.field_w <= l.px_w);
            assert!(l.field_h <= l.px_h);
            assert_eq!(l.play_y + l.play_rows, rows);
        }
    }

    #[test]
    fn test_layout_keeps_aspect() {
        let l = fit_layout(200, 60).unwrap();
        let ratio = l.field_w as f32 / l.field_h as f32;
        let world = WIDTH as f32 / HEIGHT as f32;
        assert!((ratio - world).abs() < 0.05);
    }

    #[test]
    fn test_layout_rejects_tiny_terminal() {
        assert!(fit_layout(10, 40).is_none());
        assert!(fit_layout(80, 5).is_none());
    }

    // ── Terminal setup ──

    #[test]
    fn test_setup_failure_leaves_alternate_screen() {
        let mut out: Vec<u8> = Vec::new();
        let res: anyhow::Result<()> =
            restore_on_err(&mut out, Err(io::Error::new(io::ErrorKind::Other, "no tty")));
        assert!(res.is_err());
        let written = String::from_utf8_lossy(&out);
        assert!(written.contains("\x1b[?1049l"), "wrote {written:?}");
        assert!(written.contains("\x1b[?25h"));
    }

    #[test]
    fn test_setup_success_writes_nothing() {
        let mut out: Vec<u8> = Vec::new();
        let v = restore_on_err(&mut out, Ok((80u16, 24u16))).unwrap();
        assert_eq!(v, (80, 24));
        assert!(out.is_empty());
    }

    // ── Dashes ──

    #[test]
    fn test_dash_offset_wraps() {
        assert_eq!(dash_offset(0), 0);
        assert_eq!(dash_offset(6), -1);
        assert_eq!(dash_offset(6 * 49), -49);
        assert_eq!(dash_offset(6 * 50), 0);
        for ms in (0..10_000).step_by(7) {
            let o = dash_offset(ms);
            assert!(o <= 0 && o > -(DASH_LEN + DASH_GAP));
        }
    }

    // ── Frames ──

    #[test]
    fn test_hud_shows_score_and_legend() {
        let mut buf = CellBuffer::new(80, 30);
        let mut s = Session::new();
        s.score = 17;
        draw_frame(&mut buf, &s, 0, true);
        assert!(row_text(&buf, 0).contains("Score: 17"));
        assert!(row_text(&buf, 1).contains("R restart"));
    }

    #[test]
    fn test_player_is_drawn_near_bottom() {
        let mut buf = CellBuffer::new(80, 40);
        draw_frame(&mut buf, &Session::new(), 0, true);

        let l = fit_layout(80, 40).unwrap();
        let pal = palette(true);
        let car_rows: Vec<u16> = (0..buf.h)
            .filter(|&y| {
                (0..buf.w).any(|x| {
                    let c = buf.cells[buf.idx(x, y)];
                    c.fg == pal.car && c.ch != ' '
                })
            })
            .collect();
        assert!(!car_rows.is_empty());
        assert!(car_rows.iter().all(|&y| y > l.play_y + l.play_rows / 2));
    }

    #[test]
    fn test_pause_banner() {
        let mut buf = CellBuffer::new(80, 30);
        let mut s = Session::new();
        s.phase = Phase::Paused;
        draw_frame(&mut buf, &s, 0, true);
        assert!(screen_text(&buf).contains("PAUSED"));
        assert!(!screen_text(&buf).contains("GAME OVER"));
    }

    #[test]
    fn test_game_over_box() {
        let mut buf = CellBuffer::new(80, 30);
        let mut s = Session::new();
        s.score = 42;
        s.player.alive = false;
        s.phase = Phase::GameOver;
        draw_frame(&mut buf, &s, 0, true);
        let text = screen_text(&buf);
        assert!(text.contains("GAME OVER"));
        assert!(text.contains("Final Score: 42"));
        assert!(text.contains("Press R to play again or ESC to quit"));
    }

    #[test]
    fn test_running_frame_has_no_banner() {
        let mut buf = CellBuffer::new(80, 30);
        draw_frame(&mut buf, &Session::new(), 1234, true);
        let text = screen_text(&buf);
        assert!(!text.contains("PAUSED"));
        assert!(!text.contains("GAME OVER"));
    }

    #[test]
    fn test_tiny_terminal_message() {
        let mut buf = CellBuffer::new(30, 6);
        draw_frame(&mut buf, &Session::new(), 0, true);
        assert!(screen_text(&buf).contains("Terminal too small"));
    }

    #[test]
    fn test_monochrome_frame() {
        let mut buf = CellBuffer::new(80, 30);
        draw_frame(&mut buf, &Session::new(), 0, false);
        assert!(buf
            .cells
            .iter()
            .all(|c| c.fg == Color::White && c.bg == Color::Black));
    }

    #[test]
    fn test_offscreen_obstacle_is_clipped() {
        let mut buf = CellBuffer::new(80, 30);
        let mut s = Session::new();
        s.obstacles.push(Obstacle::new(0, 4, 50, ObstacleColor::Red));
        draw_frame(&mut buf, &s, 0, true);
        let pal = palette(true);
        assert!(!buf.cells.iter().any(|c| c.fg == pal.red && c.ch != ' '));
    }

    #[test]
    fn test_braille_full_block() {
        let mut dots = 0u8;
        for dy in 0..4 {
            for dx in 0..2 {
                dots |= braille_bit(dx, dy);
            }
        }
        assert_eq!(braille_char(dots), '⣿');
    }
}
