//! Program text: comma-separated base-10 signed integers.

use crate::error::{Result, VmError};
use blake3::Hasher;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Parsed program cells. Cloning is cheap; every `Memory` built from a
/// program gets its own copy of the cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    cells: Arc<[i64]>,
}

impl Program {
    /// Parse program text. Surrounding whitespace (including a trailing
    /// newline) is trimmed, as is whitespace around each token.
    pub fn parse(text: &str) -> Result<Self> {
        let cells = text
            .trim()
            .split(',')
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| VmError::MalformedProgram {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<i64>>>()?;
        Ok(Self {
            cells: cells.into(),
        })
    }

    pub fn from_cells(cells: Vec<i64>) -> Self {
        Self {
            cells: cells.into(),
        }
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Content fingerprint `b3:<hex>` over the canonical text form.
    pub fn cid(&self) -> String {
        let mut h = Hasher::new();
        h.update(self.to_string().as_bytes());
        format!("b3:{}", hex::encode(h.finalize().as_bytes()))
    }
}

impl FromStr for Program {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}
