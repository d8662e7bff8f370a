//! Starter code shown when a session switches language.

use frames::Language;

/// Starter text for `language`.
#[must_use]
pub fn template(language: Language) -> &'static str {
    match language {
        Language::JavaScript => "// JavaScript Example\nconsole.log(\"Hello World\");",
        Language::Python => "# Python Example\nprint(\"Hello World\")",
        Language::Go => "// Go Example\npackage main\nimport \"fmt\"\nfunc main() {\n\tfmt.Println(\"Hello World\")\n}",
    }
}

#[cfg(test)]
#[path = "templates_test.rs"]
mod tests;
