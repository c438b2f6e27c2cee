//! `splits completions` — generate shell completion scripts.

use clap::Args;
use clap_complete::Shell;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run_completions(shell: Shell, command: &mut clap::Command) -> anyhow::Result<()> {
    let name = command.get_name().to_string();
    clap_complete::generate(shell, command, name, &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CompletionsArgs;
    use clap::Parser;
    use clap_complete::Shell;

    #[test]
    fn completions_args_parse_shell() {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: CompletionsArgs,
        }
        let w = Wrapper::parse_from(["test", "zsh"]);
        assert_eq!(w.args.shell, Shell::Zsh);
    }
}
