mod app;
mod config;
mod difficulty;
mod input;
mod logging;
mod model;
mod render;
mod sim;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
