use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, SplitError};

/// A printf-style output path such as `chunks/%05d.mp4`, holding exactly one
/// integer conversion that is replaced by the segment index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    raw: String,
    prefix: String,
    suffix: String,
    spec: IndexSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct IndexSpec {
    zero_pad: bool,
    left_align: bool,
    width: usize,
}

impl OutputTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            SplitError::ConfigValidation(format!("output template {template:?} {reason}"))
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec = None;

        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            let out = if spec.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }

            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }

            let mut parsed = IndexSpec::default();
            while let Some(&flag) = chars.peek() {
                match flag {
                    '0' => parsed.zero_pad = true,
                    '-' => parsed.left_align = true,
                    _ => break,
                }
                chars.next();
            }

            let mut width = String::new();
            while let Some(&digit) = chars.peek().filter(|c| c.is_ascii_digit()) {
                width.push(digit);
                chars.next();
            }
            if !width.is_empty() {
                parsed.width = width
                    .parse()
                    .map_err(|_| invalid("has an unreadable field width"))?;
            }

            match chars.next() {
                Some('d' | 'i' | 'u') => {}
                Some(other) => {
                    return Err(invalid(&format!(
                        "uses unsupported conversion '%{other}'"
                    )))
                }
                None => return Err(invalid("ends with an incomplete conversion")),
            }

            if spec.is_some() {
                return Err(invalid("must contain exactly one integer placeholder"));
            }
            spec = Some(parsed);
        }

        let spec = spec.ok_or_else(|| invalid("must contain exactly one integer placeholder"))?;

        Ok(Self {
            raw: template.to_string(),
            prefix,
            suffix,
            spec,
        })
    }

    /// Path of the segment with the given zero-based index.
    pub fn render(&self, index: u64) -> PathBuf {
        let IndexSpec {
            zero_pad,
            left_align,
            width,
        } = self.spec;

        let number = if left_align {
            format!("{index:<width$}")
        } else if zero_pad {
            format!("{index:0width$}")
        } else {
            format!("{index:>width$}")
        };

        PathBuf::from(format!("{}{}{}", self.prefix, number, self.suffix))
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
