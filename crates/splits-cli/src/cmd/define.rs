//! `splits define` — define or replace a split's variant registry.

use crate::cmd::{acquire_write_lock, fail, open_store};
use crate::output::{OutputMode, render_item};
use crate::views::SplitView;
use clap::Args;
use splits_core::clock;
use splits_core::db::store;
use splits_core::model::Variant;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DefineArgs {
    /// Split (experiment) name.
    pub name: String,

    /// Variant spec, `name` or `name:weight`; repeatable.
    #[arg(short = 'v', long = "variant", required = true, value_parser = parse_variant)]
    pub variants: Vec<Variant>,
}

fn parse_variant(spec: &str) -> Result<Variant, String> {
    let (name, weight) = match spec.split_once(':') {
        Some((name, weight)) => {
            let weight: u32 = weight
                .parse()
                .map_err(|_| format!("invalid weight in '{spec}': expected name:weight"))?;
            (name, weight)
        }
        None => (spec, 0),
    };

    if name.trim().is_empty() {
        return Err(format!("blank variant name in '{spec}'"));
    }

    Ok(Variant {
        name: name.to_string(),
        weight,
    })
}

pub fn run_define(args: &DefineArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    let _lock = acquire_write_lock(store_root)?;
    let mut conn = open_store(store_root)?;

    let split = store::define_split(&mut conn, &args.name, &args.variants, clock::now_us())
        .map_err(|err| fail(output, err))?;

    render_item(&SplitView { split }, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DefineArgs, parse_variant};
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: DefineArgs,
    }

    #[test]
    fn variant_spec_without_weight_defaults_to_zero() {
        let variant = parse_variant("red").expect("parse");
        assert_eq!(variant.name, "red");
        assert_eq!(variant.weight, 0);
    }

    #[test]
    fn variant_spec_with_weight_parses() {
        let variant = parse_variant("blue:75").expect("parse");
        assert_eq!(variant.name, "blue");
        assert_eq!(variant.weight, 75);
    }

    #[test]
    fn bad_weight_is_rejected() {
        assert!(parse_variant("red:heavy").is_err());
        assert!(parse_variant(":10").is_err());
    }

    #[test]
    fn define_args_collect_repeated_variants() {
        let w = Wrapper::parse_from(["test", "button_color", "-v", "red:50", "-v", "blue:50"]);
        assert_eq!(w.args.name, "button_color");
        assert_eq!(w.args.variants.len(), 2);
        assert_eq!(w.args.variants[1].name, "blue");
    }

    #[test]
    fn define_requires_at_least_one_variant() {
        assert!(Wrapper::try_parse_from(["test", "button_color"]).is_err());
    }
}
