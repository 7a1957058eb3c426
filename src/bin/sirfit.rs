use anyhow::Context;

fn main() -> anyhow::Result<()> {
    sirfit::runner::run().context("sirfit failed")?;
    Ok(())
}
