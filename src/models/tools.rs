//! Preset editing tools.
//!
//! A tool is a named natural-language instruction that the editor sends to the
//! model together with the current image. Tools are grouped into categories for
//! display; lookups go through [`ToolCatalog`] by stable id.

use indexmap::IndexMap;

/// A preset edit instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub id: &'static str,
    pub name: &'static str,
    pub prompt: &'static str,
}

/// A display group of tools
#[derive(Debug, Clone, Copy)]
pub struct ToolCategory {
    pub name: &'static str,
    pub tools: &'static [Tool],
}

pub const TOOL_CATEGORIES: &[ToolCategory] = &[
    ToolCategory {
        name: "Basic Tools",
        tools: &[
            Tool {
                id: "remove-bg",
                name: "Remove Background",
                prompt: "Remove the background from this image with smooth edge blending.",
            },
            Tool {
                id: "cut-out",
                name: "Cut Out Subject",
                prompt: "Cut out the main subject and place it on a transparent background.",
            },
            Tool {
                id: "crop-person",
                name: "Crop Person",
                prompt: "Automatically detect and crop the person from the photo.",
            },
            Tool {
                id: "cleanup",
                name: "Clean Up",
                prompt: "Clean up the background by removing unwanted objects or people.",
            },
            Tool {
                id: "blur-bg",
                name: "Blur Background",
                prompt: "Blur the background but keep the main subject sharp.",
            },
        ],
    },
    ToolCategory {
        name: "Color & Filters",
        tools: &[
            Tool {
                id: "cinematic",
                name: "Cinematic Grade",
                prompt: "Apply cinematic color grading with teal and orange tones.",
            },
            Tool {
                id: "enhance",
                name: "Enhance",
                prompt: "Enhance brightness, contrast, and sharpness for a professional look.",
            },
            Tool {
                id: "watercolor",
                name: "Watercolor",
                prompt: "Make the image look like a watercolor painting.",
            },
            Tool {
                id: "bw",
                name: "Black & White",
                prompt: "Apply a black-and-white filter with soft contrast.",
            },
            Tool {
                id: "skin-tone",
                name: "Portrait Enhance",
                prompt: "Adjust skin tones and lighting for natural portrait enhancement.",
            },
        ],
    },
    ToolCategory {
        name: "Editing & Retouch",
        tools: &[
            Tool {
                id: "remove-blemishes",
                name: "Remove Blemishes",
                prompt: "Remove blemishes or small spots from faces or surfaces.",
            },
            Tool {
                id: "heal",
                name: "Heal Damage",
                prompt: "Clone and heal damaged parts of the image seamlessly.",
            },
            Tool {
                id: "fill",
                name: "Content-Aware Fill",
                prompt: "Fill empty areas using AI-powered content-aware fill. This requires a selection mask.",
            },
            Tool {
                id: "upscale",
                name: "Upscale 4x",
                prompt: "Upscale this image to 4x resolution while keeping clarity.",
            },
            Tool {
                id: "denoise",
                name: "Denoise",
                prompt: "Convert this low-light photo into a well-lit, noise-free image.",
            },
        ],
    },
];

/// Id-indexed view over [`TOOL_CATEGORIES`], preserving display order.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: IndexMap<&'static str, Tool>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        let tools = TOOL_CATEGORIES
            .iter()
            .flat_map(|category| category.tools.iter())
            .map(|tool| (tool.id, *tool))
            .collect();
        Self { tools }
    }

    /// Find a tool by id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&Tool> {
        self.tools.get(id).or_else(|| {
            self.tools
                .values()
                .find(|tool| tool.id.eq_ignore_ascii_case(id))
        })
    }

    pub fn categories(&self) -> &'static [ToolCategory] {
        TOOL_CATEGORIES
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_contains_every_tool() {
        let catalog = ToolCatalog::new();
        assert_eq!(catalog.len(), 15);
        assert_eq!(catalog.categories().len(), 3);
    }

    #[test]
    fn test_tool_ids_are_unique() {
        let ids: HashSet<_> = TOOL_CATEGORIES
            .iter()
            .flat_map(|c| c.tools.iter().map(|t| t.id))
            .collect();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = ToolCatalog::new();

        let tool = catalog.get("remove-bg").unwrap();
        assert_eq!(tool.name, "Remove Background");

        let tool = catalog.get("ENHANCE").unwrap();
        assert_eq!(tool.name, "Enhance");

        assert!(catalog.get("sharpen").is_none());
    }

    #[test]
    fn test_iteration_follows_display_order() {
        let catalog = ToolCatalog::new();
        let first: Vec<_> = catalog.iter().take(2).map(|t| t.id).collect();
        assert_eq!(first, vec!["remove-bg", "cut-out"]);
        assert_eq!(catalog.iter().last().map(|t| t.id), Some("denoise"));
    }
}
