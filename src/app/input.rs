//! DOI input from arguments or stdin.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};

/// Splits free text into DOIs on whitespace and commas.
pub(crate) fn parse_doi_list(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// DOIs from positional arguments, else from piped stdin.
pub(crate) fn read_dois(args: &[String]) -> Result<Vec<String>> {
    if !args.is_empty() {
        return Ok(parse_doi_list(&args.join("\n")));
    }
    if io::stdin().is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read DOIs from stdin")?;
    Ok(parse_doi_list(&buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_doi_list_splits_on_commas_and_whitespace() {
        let dois = parse_doi_list("10.1/a, 10.1/b\n\n10.1/c\t10.1/d,,");
        assert_eq!(dois, vec!["10.1/a", "10.1/b", "10.1/c", "10.1/d"]);
    }

    #[test]
    fn test_parse_doi_list_empty_input() {
        assert!(parse_doi_list("  \n , ").is_empty());
    }
}
