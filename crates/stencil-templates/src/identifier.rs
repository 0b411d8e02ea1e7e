//! Template identifier syntax
//!
//! Identifiers are `/`-separated paths. A segment starting with `@` names a
//! special folder, the last segment is the template name:
//!
//! ```text
//! @Workspace/@Invoice/print
//! @Generators/rest-api/controller
//! reports/summary
//! ```
//!
//! Everything here is pure: no filesystem access, no shared state.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Separator between identifier segments
pub const SEGMENT_SEPARATOR: char = '/';

/// Prefix marking a special-folder segment
pub const SPECIAL_FOLDER_PREFIX: char = '@';

/// Characters a template name may not contain
pub const INVALID_NAME_CHARS: [char; 3] = ['@', '/', '\\'];

/// Special folders that always exist
pub mod special {
    /// Per-workspace artifacts
    pub const WORKSPACE: &str = "Workspace";
    /// Generator templates
    pub const GENERATORS: &str = "Generators";
    /// Templates owned by template engines
    pub const TEMPLATE_ENGINES: &str = "TemplateEngines";
    /// Free-form user templates
    pub const USER_DEFINED: &str = "UserDefined";

    /// All built-in roots, in registration order
    pub const BUILT_IN: [&str; 4] = [WORKSPACE, GENERATORS, TEMPLATE_ENGINES, USER_DEFINED];
}

/// Result of parsing a template identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplateIdentifier {
    full_identifier: String,
    root_special_folder: String,
    path_segments: Vec<String>,
    special_folder_segments: Vec<String>,
    template_name: String,
    error_message: Option<String>,
}

impl ParsedTemplateIdentifier {
    fn invalid(identifier: &str, message: impl Into<String>) -> Self {
        Self {
            full_identifier: identifier.to_string(),
            root_special_folder: String::new(),
            path_segments: Vec::new(),
            special_folder_segments: Vec::new(),
            template_name: String::new(),
            error_message: Some(message.into()),
        }
    }

    /// The identifier exactly as given
    pub fn full_identifier(&self) -> &str {
        &self.full_identifier
    }

    /// First segment without `@` when it is special, otherwise empty
    pub fn root_special_folder(&self) -> &str {
        &self.root_special_folder
    }

    /// All non-final segments, `@` retained
    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }

    /// Special segments only, `@` stripped, in encountered order
    pub fn special_folder_segments(&self) -> &[String] {
        &self.special_folder_segments
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn is_valid(&self) -> bool {
        self.error_message.is_none()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn has_special_folders(&self) -> bool {
        !self.special_folder_segments.is_empty()
    }

    /// Non-final segments as folder names (`@` stripped)
    pub fn folder_names(&self) -> impl Iterator<Item = &str> {
        self.path_segments.iter().map(|s| strip_special_prefix(s))
    }
}

impl fmt::Display for ParsedTemplateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_identifier)
    }
}

impl FromStr for ParsedTemplateIdentifier {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TemplateIdentifierSyntax::parse(s))
    }
}

/// Strip one leading `@` (after trimming) from a folder name
pub fn strip_special_prefix(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed.strip_prefix(SPECIAL_FOLDER_PREFIX).unwrap_or(trimmed)
}

pub(crate) fn is_special_segment(segment: &str) -> bool {
    segment.trim_start().starts_with(SPECIAL_FOLDER_PREFIX)
}

/// Parser and builder for template identifiers
pub struct TemplateIdentifierSyntax;

impl TemplateIdentifierSyntax {
    /// Parse an identifier. Never fails; check [`ParsedTemplateIdentifier::is_valid`].
    pub fn parse(identifier: &str) -> ParsedTemplateIdentifier {
        if identifier.trim().is_empty() {
            return ParsedTemplateIdentifier::invalid(identifier, "Template identifier is empty");
        }

        let mut segments: Vec<&str> = identifier
            .split(SEGMENT_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let Some(template_name) = segments.pop() else {
            return ParsedTemplateIdentifier::invalid(
                identifier,
                "Template identifier contains no segments",
            );
        };

        if !Self::is_valid_template_name(template_name) {
            return ParsedTemplateIdentifier::invalid(
                identifier,
                format!(
                    "Template name '{}' must not contain any of {:?}",
                    template_name, INVALID_NAME_CHARS
                ),
            );
        }

        let special_folder_segments: Vec<String> = segments
            .iter()
            .filter(|s| is_special_segment(s))
            .map(|s| strip_special_prefix(s).to_string())
            .collect();

        let root_special_folder = segments
            .first()
            .filter(|s| is_special_segment(s))
            .map(|s| strip_special_prefix(s).to_string())
            .unwrap_or_default();

        ParsedTemplateIdentifier {
            full_identifier: identifier.to_string(),
            root_special_folder,
            path_segments: segments.into_iter().map(str::to_string).collect(),
            special_folder_segments,
            template_name: template_name.to_string(),
            error_message: None,
        }
    }

    /// Whether the identifier uses special-folder syntax at all
    pub fn has_special_folder_syntax(identifier: &str) -> bool {
        identifier.contains(SPECIAL_FOLDER_PREFIX)
    }

    /// Build `@root/sub.../name`. Sub-folders are used verbatim, so pass
    /// `@Name` for a nested special folder.
    pub fn build<S: AsRef<str>>(
        root_special_folder: &str,
        sub_folders: &[S],
        template_name: &str,
    ) -> String {
        let mut parts = Vec::with_capacity(sub_folders.len() + 2);
        parts.push(format!(
            "{}{}",
            SPECIAL_FOLDER_PREFIX,
            strip_special_prefix(root_special_folder)
        ));
        parts.extend(
            sub_folders
                .iter()
                .map(|s| s.as_ref().trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        parts.push(template_name.to_string());
        parts.join("/")
    }

    /// `@Workspace/<artifact>/sub.../name`
    pub fn workspace<S: AsRef<str>>(
        artifact: &str,
        sub_folders: &[S],
        template_name: &str,
    ) -> String {
        Self::build_under(special::WORKSPACE, artifact, sub_folders, template_name)
    }

    /// `@Generators/<generator>/sub.../name`
    pub fn generators<S: AsRef<str>>(
        generator_id: &str,
        sub_folders: &[S],
        template_name: &str,
    ) -> String {
        Self::build_under(special::GENERATORS, generator_id, sub_folders, template_name)
    }

    /// `@TemplateEngines/<engine>/sub.../name`
    pub fn template_engines<S: AsRef<str>>(
        engine_id: &str,
        sub_folders: &[S],
        template_name: &str,
    ) -> String {
        Self::build_under(special::TEMPLATE_ENGINES, engine_id, sub_folders, template_name)
    }

    /// `@UserDefined/<category>/sub.../name`
    pub fn user_defined<S: AsRef<str>>(
        category: &str,
        sub_folders: &[S],
        template_name: &str,
    ) -> String {
        Self::build_under(special::USER_DEFINED, category, sub_folders, template_name)
    }

    fn build_under<S: AsRef<str>>(
        root: &str,
        first: &str,
        sub_folders: &[S],
        template_name: &str,
    ) -> String {
        let mut all: Vec<&str> = Vec::with_capacity(sub_folders.len() + 1);
        all.push(first);
        all.extend(sub_folders.iter().map(AsRef::as_ref));
        Self::build(root, &all, template_name)
    }

    /// Non-empty and free of `@`, `/` and `\`
    pub fn is_valid_template_name(name: &str) -> bool {
        !name.trim().is_empty() && !name.contains(INVALID_NAME_CHARS)
    }
}
