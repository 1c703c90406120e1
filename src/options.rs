//! Configuration consumed by the reader and the writer.

/// Wire-format quirk modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatBehavior {
    #[default]
    Default,
    /// Server-compatible behavior: skips the media-resource validation pass
    /// and omits type attributes on null markers.
    Server,
    /// Client-compatible behavior.
    Client,
}

/// Whether the payload travels in a request or a response message.
///
/// Request payloads report unexpanded navigation links as entity reference
/// links; response payloads report them as plain deferred links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    Request,
    #[default]
    Response,
}

/// Recognized codec options.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Caps the nesting depth of complex and collection values.
    pub max_nesting_depth: usize,
    /// Surface undeclared navigation links instead of rejecting them.
    pub report_undeclared_link_properties: bool,
    /// Skip undeclared value properties instead of failing on them.
    pub ignore_undeclared_value_properties: bool,
    /// Wire-format quirk mode.
    pub format_behavior: FormatBehavior,
    /// Bind the root element's namespace as the default namespace.
    pub always_use_default_namespace_for_root: bool,
    /// Write instance annotations; when false they are filtered out.
    pub include_annotations: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            max_nesting_depth: 100,
            report_undeclared_link_properties: false,
            ignore_undeclared_value_properties: false,
            format_behavior: FormatBehavior::Default,
            always_use_default_namespace_for_root: true,
            include_annotations: true,
        }
    }
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_undeclared_links_reported(mut self, report: bool) -> Self {
        self.report_undeclared_link_properties = report;
        self
    }

    pub fn with_undeclared_values_ignored(mut self, ignore: bool) -> Self {
        self.ignore_undeclared_value_properties = ignore;
        self
    }

    pub fn with_behavior(mut self, behavior: FormatBehavior) -> Self {
        self.format_behavior = behavior;
        self
    }

    pub fn with_annotations(mut self, include: bool) -> Self {
        self.include_annotations = include;
        self
    }
}
