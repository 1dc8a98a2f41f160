//! Writes the service's OpenAPI document as pretty JSON.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json

use std::{env, fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use temperature_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to serialise OpenAPI document")?;

    match output_path(env::args()) {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("OpenAPI document written to {}", path.display());
        }
        None => std::io::stdout()
            .write_all(json.as_bytes())
            .context("failed to write to stdout")?,
    }
    Ok(())
}

/// Value following `--output`, if any.
fn output_path(args: impl Iterator<Item = String>) -> Option<PathBuf> {
    let args: Vec<String> = args.collect();
    args.windows(2)
        .find(|w| w[0] == "--output")
        .map(|w| PathBuf::from(&w[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn output_flag_is_parsed() {
        assert_eq!(
            output_path(args(&["gen", "--output", "api.json"])),
            Some(PathBuf::from("api.json"))
        );
    }

    #[test]
    fn stdout_when_no_flag() {
        assert_eq!(output_path(args(&["gen"])), None);
        assert_eq!(output_path(args(&["gen", "--output"])), None);
    }

    #[test]
    fn document_lists_reading_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/readings", "/readings/batch", "/readings/latest", "/readings/{id}", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
