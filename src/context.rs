//! Shared validation context: the ontology index, the frozen schema cache and
//! the coercion registry. Built once, then shared read-only across runs.

use std::sync::Arc;

use serde_json::Value;

use crate::check::CoercionRegistry;
use crate::error::LoadError;
use crate::ontology::{OntologyDocument, OntologyIndex};
use crate::schema::resolve::escape;
use crate::schema::{ONTOLOGY_DOC, SchemaBundle, SchemaCache, SchemaResolver};

#[derive(Debug)]
pub struct ValidationContext {
    ontology: OntologyIndex,
    schemas: SchemaBundle,
    cache: SchemaCache,
    coercions: CoercionRegistry,
}

impl ValidationContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn ontology(&self) -> &OntologyIndex {
        &self.ontology
    }

    pub fn schemas(&self) -> &SchemaBundle {
        &self.schemas
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn coercions(&self) -> &CoercionRegistry {
        &self.coercions
    }

    /// Per-run resolver reading through the frozen cache.
    pub fn resolver(&self) -> SchemaResolver<'_> {
        SchemaResolver::overlay(&self.schemas, &self.cache)
    }
}

#[derive(Debug, Default)]
pub struct ContextBuilder {
    schemas: SchemaBundle,
    ontology: Option<Value>,
    checkpoints: Option<Vec<String>>,
    coercions: Option<CoercionRegistry>,
}

impl ContextBuilder {
    /// Add a schema document, addressable as `<id>#/pointer`.
    pub fn schema_document(mut self, id: impl Into<String>, document: Value) -> Self {
        self.schemas.insert(id, document);
        self
    }

    pub fn ontology_value(mut self, document: Value) -> Self {
        self.ontology = Some(document);
        self
    }

    /// Capabilities treated as checkpoint providers in addition to those
    /// flagged in the ontology.
    pub fn checkpoint_capabilities(mut self, ids: Vec<String>) -> Self {
        self.checkpoints = Some(ids);
        self
    }

    pub fn coercions(mut self, registry: CoercionRegistry) -> Self {
        self.coercions = Some(registry);
        self
    }

    pub fn build(self) -> Result<Arc<ValidationContext>, LoadError> {
        self.build_inner().inspect_err(|e| {
            tracing::warn!(error = %e, "validation context rejected");
        })
    }

    fn build_inner(self) -> Result<Arc<ValidationContext>, LoadError> {
        let ContextBuilder {
            mut schemas,
            ontology,
            checkpoints,
            coercions,
        } = self;

        let raw = ontology.ok_or_else(|| LoadError::Document("no ontology document given".into()))?;
        let document: OntologyDocument =
            serde_json::from_value(raw.clone()).map_err(|e| LoadError::Document(e.to_string()))?;
        schemas.insert(ONTOLOGY_DOC, raw);

        let checkpoints = checkpoints.unwrap_or_else(|| vec!["checkpoint".to_string()]);
        let (ontology, cache) = {
            let mut resolver = SchemaResolver::new(&schemas);
            let ontology = OntologyIndex::build(&document, &mut resolver, &checkpoints)?;
            for id in schemas.ids() {
                let Some(doc) = schemas.get(id) else {
                    continue;
                };
                for section in ["definitions", "$defs"] {
                    let Some(defs) = doc.get(section).and_then(Value::as_object) else {
                        continue;
                    };
                    for name in defs.keys() {
                        let pointer = format!("/{}/{}", escape(section), escape(name));
                        resolver.resolve_pointer(id, &pointer)?;
                    }
                }
            }
            (ontology, resolver.into_cache())
        };

        tracing::info!(
            capabilities = ontology.len(),
            edges = ontology.edge_count(),
            documents = schemas.len(),
            schemas = cache.len(),
            "validation context built"
        );

        Ok(Arc::new(ValidationContext {
            ontology,
            schemas,
            cache,
            coercions: coercions.unwrap_or_default(),
        }))
    }
}
