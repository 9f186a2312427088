pub(crate) const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Main attributes of a JAR manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// Parse the main section: `Name: value` lines, continuation lines start
    /// with a single space, the section ends at the first blank line.
    pub(crate) fn parse(content: &str) -> Self {
        let mut attributes: Vec<(String, String)> = Vec::new();

        for line in content.lines() {
            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = attributes.last_mut() {
                    value.push_str(continuation);
                }
                continue;
            }

            if let Some((name, value)) = line.split_once(':') {
                attributes.push((
                    name.trim().to_string(),
                    value.strip_prefix(' ').unwrap_or(value).to_string(),
                ));
            }
        }

        Self { attributes }
    }

    /// Attribute names compare case-insensitively.
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
