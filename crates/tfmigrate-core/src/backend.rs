//! Backend configuration rewriting.
//!
//! `locate_block` finds the first top-level block whose header starts with a
//! keyword and returns its byte span. It is a brace counter, not an HCL
//! parser: braces inside string literals or comments are counted too.
//!
//! `rewrite_backend` replaces the `terraform { ... }` block with a remote
//! backend declaration and leaves every other byte untouched.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Keyword of the block that carries the backend declaration.
pub const TERRAFORM_KEYWORD: &str = "terraform";

/// Half-open byte range `[start, end)` of a located block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }
}

/// Returned when the searched block does not exist or never closes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no {keyword} configuration block found")]
pub struct NoBlockFound {
    pub keyword: String,
}

/// Locate the block introduced by the first occurrence of `keyword`.
///
/// The match is a plain substring match (no word boundaries). From there a
/// depth counter follows `{` and `}`; the block ends right after the `}` that
/// brings the depth back to zero. Returns `None` when the keyword is absent or
/// the block is never closed.
pub fn locate_block(text: &str, keyword: &str) -> Option<BlockSpan> {
    let start = text.find(keyword)?;

    let mut depth: i64 = 0;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(BlockSpan {
                        start,
                        end: start + offset + 1,
                    });
                }
            }
            _ => {}
        }
    }

    None
}

/// Where the rewritten backend should point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTarget {
    pub hostname: String,
    pub organization: String,
    pub workspace: String,
}

/// Render the remote backend block for `target`.
pub fn render_backend_block(target: &BackendTarget) -> String {
    format!(
        r#"terraform {{
  backend "remote" {{
    hostname     = "{hostname}"
    organization = "{organization}"

    workspaces {{
      name = "{workspace}"
    }}
  }}
}}"#,
        hostname = target.hostname,
        organization = target.organization,
        workspace = target.workspace,
    )
}

/// Replace the `terraform` block of `text` with a remote backend block.
pub fn rewrite_backend(text: &str, target: &BackendTarget) -> Result<String, NoBlockFound> {
    let span = locate_block(text, TERRAFORM_KEYWORD).ok_or_else(|| NoBlockFound {
        keyword: TERRAFORM_KEYWORD.to_string(),
    })?;

    let block = render_backend_block(target);
    let mut out = String::with_capacity(text.len() - (span.end - span.start) + block.len());
    out.push_str(&text[..span.start]);
    out.push_str(&block);
    out.push_str(&text[span.end..]);
    Ok(out)
}
