//! WQL (WMI Query Language) SELECT builder.

/// Builder for WQL SELECT statements.
#[derive(Debug, Clone)]
pub struct WqlBuilder {
    fields: Vec<String>,
    class: String,
    conditions: Vec<String>,
}

impl WqlBuilder {
    pub fn select(class: &str) -> Self {
        Self {
            fields: Vec::new(),
            class: class.to_string(),
            conditions: Vec::new(),
        }
    }

    /// Fields to return (`*` if none are given). Duplicates are dropped.
    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        for f in fields {
            let f = f.as_ref();
            if !self.fields.iter().any(|existing| existing.eq_ignore_ascii_case(f)) {
                self.fields.push(f.to_string());
            }
        }
        self
    }

    /// `Property = 'value'`
    pub fn where_eq(mut self, property: &str, value: &str) -> Self {
        self.conditions.push(format!("{} = '{}'", property, wql_escape(value)));
        self
    }

    /// `Property LIKE 'pattern'`
    pub fn where_like(mut self, property: &str, pattern: &str) -> Self {
        self.conditions.push(format!("{} LIKE '{}'", property, wql_escape(pattern)));
        self
    }

    pub fn build(&self) -> String {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        let mut q = format!("SELECT {} FROM {}", fields, self.class);
        if !self.conditions.is_empty() {
            q.push_str(" WHERE ");
            q.push_str(&self.conditions.join(" AND "));
        }
        q
    }
}

/// Escape a literal for use inside single quotes.
pub fn wql_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
