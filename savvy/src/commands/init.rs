use miette::{Result, miette};
use savvy_shell::{ShellKind, dialect_for};

/// Print the hook functions for `shell`, for users who prefer to source them
/// from their own startup files.
pub fn init(shell: ShellKind) -> Result<()> {
    let dialect = dialect_for(shell).ok_or_else(|| miette!("{shell} is not supported"))?;
    println!("# savvy hooks for {}", dialect.name);
    print!("{}", dialect.hooks);
    Ok(())
}
