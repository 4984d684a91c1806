//! Splitting a combined shader file into per-stage sources.
//!
//! File format: a line containing `#shader vertex` or `#shader fragment`
//! (stage name matched case-insensitively) switches the stage that
//! following lines are appended to. Lines before the first marker are ignored.

use std::fmt;

use crate::render::batch::error::ShaderError;

/// Programmable stage of the batch pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub(crate) fn naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// WGSL sources of the two stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

const MARKER: &str = "#shader";

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Splits a combined `#shader` file.
    pub fn parse(text: &str) -> Result<Self, ShaderError> {
        let mut sources = Self::default();
        let mut current: Option<Stage> = None;

        for line in text.lines() {
            if line.contains(MARKER) {
                let lower = line.to_ascii_lowercase();
                current = if lower.contains("vertex") {
                    Some(Stage::Vertex)
                } else if lower.contains("fragment") {
                    Some(Stage::Fragment)
                } else {
                    return Err(ShaderError::UnknownStage {
                        line: line.trim().to_string(),
                    });
                };
                continue;
            }

            let Some(stage) = current else { continue };
            let target = match stage {
                Stage::Vertex => &mut sources.vertex,
                Stage::Fragment => &mut sources.fragment,
            };
            target.push_str(line);
            target.push('\n');
        }

        for stage in [Stage::Vertex, Stage::Fragment] {
            if sources.get(stage).trim().is_empty() {
                return Err(ShaderError::MissingStage(stage));
            }
        }

        Ok(sources)
    }

    pub fn get(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_stages_in_order() {
        let text = "#shader vertex\nv1\nv2\n#shader fragment\nf1\n";
        let s = ShaderSources::parse(text).unwrap();
        assert_eq!(s.vertex, "v1\nv2\n");
        assert_eq!(s.fragment, "f1\n");
    }

    #[test]
    fn stage_name_is_case_insensitive() {
        let text = "#shader FRAGMENT\nf\n#shader Vertex\nv\n";
        let s = ShaderSources::parse(text).unwrap();
        assert_eq!(s.vertex, "v\n");
        assert_eq!(s.fragment, "f\n");
    }

    #[test]
    fn marker_switches_back_and_forth() {
        let text = "#shader vertex\na\n#shader fragment\nb\n#shader vertex\nc\n";
        let s = ShaderSources::parse(text).unwrap();
        assert_eq!(s.vertex, "a\nc\n");
        assert_eq!(s.fragment, "b\n");
    }

    #[test]
    fn preamble_is_ignored() {
        let text = "// header\n#shader vertex\nv\n#shader fragment\nf\n";
        assert_eq!(ShaderSources::parse(text).unwrap().vertex, "v\n");
    }

    #[test]
    fn unknown_marker_is_rejected() {
        let err = ShaderSources::parse("#shader geometry\nx\n").unwrap_err();
        assert_eq!(
            err,
            ShaderError::UnknownStage {
                line: "#shader geometry".to_string()
            }
        );
    }

    #[test]
    fn missing_stage_is_rejected() {
        let err = ShaderSources::parse("#shader vertex\nv\n").unwrap_err();
        assert_eq!(err, ShaderError::MissingStage(Stage::Fragment));
    }
}
