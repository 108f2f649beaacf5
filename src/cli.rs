//! Interactive startup prompts

use anyhow::Result;
use rustyline::DefaultEditor;

/// Ask whether to enable bass mode. EOF or an empty line means no.
pub fn prompt_bass_mode() -> Result<bool> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("Enable bass mode? [y/N] ") {
            Ok(line) => match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                _ => println!("Please answer 'y' or 'n'."),
            },
            Err(_) => return Ok(false),
        }
    }
}
