use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "config")]
#[command(about = "Print the effective configuration as TOML")]
pub struct App {}

pub async fn run(_app: App, global: crate::Global) -> Result<()> {
    let options = crate::input::load_options(&global)?;
    println!("{}", options.to_toml_string()?.trim_end());
    Ok(())
}
