use miette::Result;
use savvy_shell::{detect_with_default, tail_history};

pub fn history(limit: usize) -> Result<()> {
    let kind = detect_with_default()?;
    for command in tail_history(kind, limit)? {
        println!("{command}");
    }
    Ok(())
}
