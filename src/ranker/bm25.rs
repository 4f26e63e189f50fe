// External BM25 ranking strategy backed by tantivy, with the in-memory
// strategy as a safety net for any index failure, and input order as the
// final fallback. Feature-gated behind `bm25-ranker`: reimplementers who
// don't want a full-text index dependency simply don't enable it.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery, TermSetQuery};
use tantivy::schema::{Field, OwnedValue, Schema, Value, FAST, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, Term};
use tracing::warn;

use super::{rank_in_memory, rank_input_order, Ranker, RankedEntity, RankerConfig};
use crate::query::SearchQuery;
use crate::types::Entity;

/// The external index's key alphabet excludes `:`, so entity IDs are
/// sanitized before indexing and the original ID is carried in a stored
/// field for the unambiguous mapping back.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

struct Fields {
    doc_id: Field,
    original_id: Field,
    entity_type: Field,
    provider: Field,
    body: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let doc_id = builder.add_text_field("doc_id", STRING | STORED | FAST);
    let original_id = builder.add_text_field("original_id", STORED);
    let entity_type = builder.add_text_field("entity_type", STRING | STORED);
    let provider = builder.add_text_field("provider", STRING | STORED);
    let body = builder.add_text_field("body", TEXT);
    (
        builder.build(),
        Fields {
            doc_id,
            original_id,
            entity_type,
            provider,
            body,
        },
    )
}

fn flatten_body(entity: &Entity) -> String {
    let mut body = format!("{} {}", entity.title, entity.description);
    for token in &entity.search_tokens {
        body.push(' ');
        body.push_str(token);
    }
    for value in entity.attributes.values() {
        body.push(' ');
        body.push_str(&value.as_searchable_text());
    }
    body
}

/// Ranks via an in-memory tantivy index rebuilt per call from the candidate
/// set, so concurrent independent searches never see each other's
/// documents. Falls back to the in-memory heuristic ranker, and from there
/// to plain input order, on any external failure.
pub struct Bm25Ranker {
    config: RankerConfig,
}

impl Bm25Ranker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    fn try_rank(&self, entities: &[Entity], query: &SearchQuery) -> anyhow::Result<Vec<RankedEntity>> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        let writer: Mutex<IndexWriter> = Mutex::new(index.writer(15_000_000)?);
        let mut by_sanitized: HashMap<String, Entity> = HashMap::new();

        {
            let mut writer = writer.lock();
            for entity in entities {
                let sanitized = sanitize_id(&entity.id.to_string());
                writer.add_document(doc!(
                    fields.doc_id => sanitized.clone(),
                    fields.original_id => entity.id.to_string(),
                    fields.entity_type => entity.entity_type.clone(),
                    fields.provider => entity.provider.clone(),
                    fields.body => flatten_body(entity),
                ))?;
                by_sanitized.insert(sanitized, entity.clone());
            }
            writer.commit()?;
        }

        let reader: IndexReader = index.reader()?;
        let searcher = reader.searcher();

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        if !query.text.is_empty() {
            let text_query = BooleanQuery::new(
                query
                    .text
                    .split_whitespace()
                    .map(|term| {
                        (
                            Occur::Should,
                            Box::new(TermQuery::new(
                                Term::from_field_text(fields.body, term),
                                tantivy::schema::IndexRecordOption::Basic,
                            )) as Box<dyn Query>,
                        )
                    })
                    .collect::<Vec<_>>(),
            );
            clauses.push((Occur::Must, Box::new(text_query)));
        }
        if let Some(entity_type) = &query.entity_type {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(fields.entity_type, entity_type),
                    tantivy::schema::IndexRecordOption::Basic,
                )),
            ));
        }

        let results: Vec<(f32, tantivy::DocAddress)> = if clauses.is_empty() {
            let all_ids: Vec<Term> = by_sanitized
                .keys()
                .map(|id| Term::from_field_text(fields.doc_id, id))
                .collect();
            searcher.search(&TermSetQuery::new(all_ids), &TopDocs::with_limit(by_sanitized.len().max(1)))?
        } else {
            searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(by_sanitized.len().max(1)))?
        };

        let mut ranked = Vec::with_capacity(results.len());
        for (position, (_score, address)) in results.into_iter().enumerate() {
            let retrieved: tantivy::TantivyDocument = searcher.doc(address)?;
            let Some(doc_id) = retrieved
                .get_first(fields.doc_id)
                .and_then(OwnedValue::as_str)
                .map(str::to_string)
            else {
                continue;
            };
            let doc_id = doc_id.as_str();
            let Some(entity) = by_sanitized.get(doc_id) else {
                continue;
            };
            ranked.push(RankedEntity {
                entity: entity.clone(),
                score: 1.0 / (position as f64 + 1.0),
                provider: entity.provider.clone(),
            });
        }
        Ok(ranked)
    }
}

#[async_trait]
impl Ranker for Bm25Ranker {
    async fn rank(&self, entities: Vec<Entity>, query: &SearchQuery) -> anyhow::Result<Vec<RankedEntity>> {
        match self.try_rank(&entities, query) {
            Ok(ranked) if !ranked.is_empty() || entities.is_empty() => Ok(ranked),
            Ok(_) => {
                warn!("bm25 ranker returned no hits for a non-empty candidate set, falling back to in-memory ranker");
                Ok(rank_in_memory(entities, query, &self.config))
            }
            Err(err) => {
                warn!(error = %err, "bm25 ranker failed, falling back to in-memory ranker");
                let in_memory = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    rank_in_memory(entities.clone(), query, &self.config)
                }));
                match in_memory {
                    Ok(ranked) => Ok(ranked),
                    Err(_) => Ok(rank_input_order(entities)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use crate::types::EntityId;
    use std::collections::HashMap as Map;

    fn entity(id: &str, title: &str) -> Entity {
        Entity {
            id: EntityId::new("fs", "default", id).unwrap(),
            entity_type: "item.file".to_string(),
            provider: "fs".to_string(),
            title: title.to_string(),
            description: String::new(),
            attributes: Map::new(),
            relationships: Vec::new(),
            search_tokens: Vec::new(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn bm25_ranker_ranks_text_matches_above_unrelated_entries() {
        let ranker = Bm25Ranker::new(RankerConfig::default());
        let query = QueryBuilder::new(200).text("budget").build().unwrap();
        let ranked = ranker
            .rank(
                vec![entity("a", "unrelated memo"), entity("b", "quarterly budget report")],
                &query,
            )
            .await
            .unwrap();
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0].entity.id.resource_id(), "b");
    }

    #[tokio::test]
    async fn empty_candidate_set_ranks_to_empty_without_falling_back() {
        let ranker = Bm25Ranker::new(RankerConfig::default());
        let query = QueryBuilder::new(200).build().unwrap();
        let ranked = ranker.rank(vec![], &query).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn sanitize_id_strips_disallowed_characters() {
        assert_eq!(sanitize_id("fs:default:/a/b.txt"), "fs_default__a_b_txt");
    }
}
