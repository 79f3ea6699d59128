// src/bin/generate_cli_files.rs
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use clap_mangen::Man;
use std::{env, fs, io::Error, path::Path};

use tapmeter::cli::Cli;

fn main() -> Result<(), Error> {
    // Get output directory from environment variable or default.
    let outdir = env::var_os("OUT_DIR").unwrap_or_else(|| "target/generated".into());
    let out_path = Path::new(&outdir);
    fs::create_dir_all(out_path)?;

    let cmd = Cli::command();
    let bin_name = "tapmeter";

    // --- Man Pages (top level plus one per subcommand) ---
    let man_path = out_path.join(format!("{bin_name}.1"));
    println!("Generating man page: {man_path:?}");
    Man::new(cmd.clone()).render(&mut fs::File::create(&man_path)?)?;

    for sub in cmd.get_subcommands() {
        let sub_path = out_path.join(format!("{bin_name}-{}.1", sub.get_name()));
        println!("Generating man page: {sub_path:?}");
        Man::new(sub.clone()).render(&mut fs::File::create(&sub_path)?)?;
    }

    // --- Shell Completions ---
    let shells = [
        (Shell::Bash, "bash"),
        (Shell::Elvish, "elv"),
        (Shell::Fish, "fish"),
        (Shell::PowerShell, "ps1"),
        (Shell::Zsh, "zsh"),
    ];
    for (shell, ext) in shells {
        let completions_path = out_path.join(format!("{bin_name}.{ext}"));
        println!("Generating completion file: {completions_path:?}");
        let mut file = fs::File::create(&completions_path)?;
        generate(shell, &mut cmd.clone(), bin_name, &mut file);
    }

    println!(
        "Successfully generated man pages and completions in: {}",
        out_path.display()
    );
    Ok(())
}
