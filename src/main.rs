use seir_markov_lockdown::runner::run_from_command_line;

fn main() -> anyhow::Result<()> {
    run_from_command_line()?;
    Ok(())
}
