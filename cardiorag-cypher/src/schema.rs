use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate node label '{0}'")]
    DuplicateLabel(String),
    #[error("relationship '{rel_type}' references unknown label '{label}'")]
    UnknownEndpoint { rel_type: String, label: String },
    #[error("schema declares no node labels")]
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLabel {
    pub label: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CypherExample {
    pub question: String,
    pub query: String,
}

/// Labels, relationship types and property names a generated query may use,
/// plus few-shot examples for the synthesizer prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub nodes: Vec<NodeLabel>,
    #[serde(default)]
    pub relationships: Vec<RelationshipType>,
    #[serde(default)]
    pub examples: Vec<CypherExample>,
}

impl GraphSchema {
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let schema: GraphSchema = serde_json::from_str(raw)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.nodes.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut labels = HashSet::new();
        for node in &self.nodes {
            if !labels.insert(node.label.as_str()) {
                return Err(SchemaError::DuplicateLabel(node.label.clone()));
            }
        }

        for rel in &self.relationships {
            for endpoint in [&rel.from, &rel.to] {
                if !labels.contains(endpoint.as_str()) {
                    return Err(SchemaError::UnknownEndpoint {
                        rel_type: rel.rel_type.clone(),
                        label: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.nodes.iter().any(|node| node.label == label)
    }

    pub fn has_relationship(&self, rel_type: &str) -> bool {
        self.relationships.iter().any(|rel| rel.rel_type == rel_type)
    }

    /// Whether `property` exists on any of `labels`, or anywhere in the
    /// schema when `labels` is empty.
    pub fn node_has_property(&self, labels: &[String], property: &str) -> bool {
        let mut candidates = self
            .nodes
            .iter()
            .filter(|node| labels.is_empty() || labels.contains(&node.label));
        candidates.any(|node| node.properties.iter().any(|p| p == property))
            || (labels.is_empty() && self.rel_has_property(&[], property))
    }

    pub fn rel_has_property(&self, rel_types: &[String], property: &str) -> bool {
        self.relationships
            .iter()
            .filter(|rel| rel_types.is_empty() || rel_types.contains(&rel.rel_type))
            .any(|rel| rel.properties.iter().any(|p| p == property))
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.node_has_property(&[], property)
    }

    /// Plain-text rendering used inside prompts.
    pub fn describe(&self) -> String {
        let mut out = String::from("Node labels and properties:\n");
        for node in &self.nodes {
            let _ = writeln!(out, "- {} {{{}}}", quote(&node.label), quoted_list(&node.properties));
        }

        out.push_str("Relationships:\n");
        for rel in &self.relationships {
            let _ = write!(
                out,
                "- (:{})-[:{}]->(:{})",
                quote(&rel.from),
                quote(&rel.rel_type),
                quote(&rel.to)
            );
            if !rel.properties.is_empty() {
                let _ = write!(out, " {{{}}}", quoted_list(&rel.properties));
            }
            out.push('\n');
        }
        out
    }

    pub fn describe_examples(&self) -> String {
        if self.examples.is_empty() {
            return "(none)".to_string();
        }
        self.examples
            .iter()
            .map(|example| format!("Question: {}\nCypher: {}", example.question, example.query))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Social-media graph around cardiovascular disease: institutions and
    /// people, their accounts and domains, engagement metrics, and posts.
    pub fn cardiovascular() -> Self {
        let node = |label: &str, properties: &[&str]| NodeLabel {
            label: label.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
        };
        let rel = |rel_type: &str, from: &str, to: &str| RelationshipType {
            rel_type: rel_type.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            properties: Vec::new(),
        };
        let example = |question: &str, query: &str| CypherExample {
            question: question.to_string(),
            query: query.to_string(),
        };

        Self {
            nodes: vec![
                node("Entity", &["EntityName", "EntityType", "Country"]),
                node("SocialMediaAccount", &["Handle", "Platform", "Followers", "Url"]),
                node("Domain", &["Name", "Url"]),
                node("Metric", &["Name", "Value", "Date"]),
                node("Author", &["Full Name", "Followers"]),
                node(
                    "Post",
                    &["ResourceId", "Full Text", "Page Type Name", "Date", "Sentiment"],
                ),
            ],
            relationships: vec![
                rel("OWNS", "Entity", "SocialMediaAccount"),
                rel("OWNS", "Entity", "Author"),
                rel("HAS_DOMAIN", "Entity", "Domain"),
                rel("HAS_METRIC", "SocialMediaAccount", "Metric"),
                rel("PUBLISHED", "SocialMediaAccount", "Post"),
                rel("CREATED", "Author", "Post"),
            ],
            examples: vec![
                example(
                    "Which entity has the most followers across its social media accounts?",
                    "MATCH (e:Entity)-[:OWNS]->(a:SocialMediaAccount) \
                     RETURN e.EntityName AS entity, sum(a.Followers) AS followers \
                     ORDER BY followers DESC LIMIT 1",
                ),
                example(
                    "How many posts did each platform publish?",
                    "MATCH (a:SocialMediaAccount)-[:PUBLISHED]->(p:Post) \
                     RETURN a.Platform AS platform, count(p) AS posts ORDER BY posts DESC",
                ),
                example(
                    "Which authors belong to the American Heart Association?",
                    "MATCH (e:Entity {EntityName: 'American Heart Association'})-[:OWNS]->(au:Author) \
                     RETURN au.`Full Name` AS author",
                ),
                example(
                    "What domains does Mayo Clinic own?",
                    "MATCH (e:Entity)-[:HAS_DOMAIN]->(d:Domain) \
                     WHERE toLower(e.EntityName) CONTAINS 'mayo clinic' \
                     RETURN d.Name AS domain, d.Url AS url",
                ),
            ],
        }
    }
}

impl Default for GraphSchema {
    fn default() -> Self {
        Self::cardiovascular()
    }
}

fn quote(name: &str) -> String {
    if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("`{name}`")
    }
}

fn quoted_list(names: &[String]) -> String {
    names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_is_consistent() {
        GraphSchema::cardiovascular().validate().unwrap();
    }

    #[test]
    fn describe_quotes_names_with_spaces() {
        let text = GraphSchema::cardiovascular().describe();
        assert!(text.contains("`Full Text`"));
        assert!(text.contains("(:Author)-[:CREATED]->(:Post)"));
    }

    #[test]
    fn property_lookup_respects_labels() {
        let schema = GraphSchema::cardiovascular();
        assert!(schema.node_has_property(&["Post".to_string()], "Full Text"));
        assert!(!schema.node_has_property(&["Post".to_string()], "Followers"));
        assert!(schema.has_property("Followers"));
    }

    #[test]
    fn json_override_rejects_dangling_relationships() {
        let raw = r#"{
            "nodes": [{"label": "Post", "properties": ["Full Text"]}],
            "relationships": [{"type": "CREATED", "from": "Author", "to": "Post"}]
        }"#;
        let err = GraphSchema::from_json(raw).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEndpoint { .. }));
    }
}
