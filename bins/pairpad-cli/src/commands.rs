// CLI commands for talking to a pairpad server
use anyhow::{bail, Context, Result};
use pairpad_common::types::{Language, SourceCode, Verdict};
use std::fs;
use std::path::PathBuf;

pub async fn submit(
    file: PathBuf,
    language: &str,
    input: Option<String>,
    input_file: Option<PathBuf>,
    server: &str,
) -> Result<()> {
    let language = parse_language(language)?;

    let content = fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let input = match (input, input_file) {
        (Some(inline), None) => inline,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => String::new(),
        (Some(_), Some(_)) => bail!("pass either --input or --input-file, not both"),
    };

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = SourceCode {
        name,
        language,
        content,
        input,
    };

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/submit", server.trim_end_matches('/')))
        .json(&request)
        .send()
        .await
        .context("failed to reach pairpad server")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("server rejected submission ({}): {}", status, body);
    }

    let verdict: Verdict = response
        .json()
        .await
        .context("failed to decode verdict")?;

    print_verdict(&verdict);
    Ok(())
}

fn parse_language(name: &str) -> Result<Language> {
    match name.to_ascii_lowercase().as_str() {
        "python3" | "python" | "py" => Ok(Language::Python3),
        "java" => Ok(Language::Java),
        other => bail!("unsupported language: {} (expected python3 or java)", other),
    }
}

fn print_verdict(verdict: &Verdict) {
    println!("status:    {:?}", verdict.status);
    println!("exit code: {}", verdict.exit_code);
    println!("run time:  {}ms", verdict.run_time);
    if verdict.output.is_empty() {
        println!("output:    (empty)");
    } else {
        println!("output:");
        for line in verdict.output.lines() {
            println!("  {}", line);
        }
    }
}
