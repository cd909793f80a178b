//! Walks the three loader shapes a resolver layer typically wires up: a
//! single-result entity loader that merges satellite data in, a one-to-many
//! relationship loader, and the degraded path against a store whose
//! relationship table has not been migrated yet.

use std::sync::Arc;

use async_trait::async_trait;
use fanload::relation::{align_by_key, group_by_key};
use fanload::{BatchFunction, Loader};

#[derive(Debug, Clone)]
struct Entity {
    id: i64,
    name: String,
    attributes: Vec<(String, String)>,
    tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct Relationship {
    from_entity: i64,
    to_entity: i64,
    kind: String,
}

#[derive(Debug, thiserror::Error)]
enum StoreError {
    #[error("relation \"{0}\" does not exist")]
    UndefinedRelation(&'static str),
    #[allow(dead_code)]
    #[error("query failed: {0}")]
    Query(String),
}

/// Stand-in for the relational store. Each method is one round-trip.
struct Store {
    entities: Vec<(i64, String)>,
    attributes: Vec<(i64, String, String)>,
    tags: Vec<(i64, String)>,
    relationships: Option<Vec<Relationship>>,
}

impl Store {
    async fn entities_by_ids(&self, ids: &[i64]) -> Result<Vec<(i64, String)>, StoreError> {
        Ok(self.entities.iter().filter(|(id, _)| ids.contains(id)).cloned().collect())
    }

    async fn attributes_by_entity_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<(i64, String, String)>, StoreError> {
        Ok(self.attributes.iter().filter(|(id, _, _)| ids.contains(id)).cloned().collect())
    }

    async fn tags_by_entity_ids(&self, ids: &[i64]) -> Result<Vec<(i64, String)>, StoreError> {
        Ok(self.tags.iter().filter(|(id, _)| ids.contains(id)).cloned().collect())
    }

    async fn relationships_by_entity_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<Relationship>, StoreError> {
        match &self.relationships {
            Some(rows) => {
                Ok(rows.iter().filter(|r| ids.contains(&r.from_entity)).cloned().collect())
            }
            None => Err(StoreError::UndefinedRelation("relationships")),
        }
    }
}

struct EntityBatchFn;

#[async_trait]
impl BatchFunction<i64, Option<Entity>> for EntityBatchFn {
    type Context = Arc<Store>;
    type Error = StoreError;

    async fn load(keys: &[i64], store: &Self::Context) -> Result<Vec<Option<Entity>>, StoreError> {
        // One round-trip per table, issued together, merged by entity id.
        let (entities, attributes, tags) = futures::try_join!(
            store.entities_by_ids(keys),
            store.attributes_by_entity_ids(keys),
            store.tags_by_entity_ids(keys),
        )?;
        let entities = align_by_key(keys, entities, |row| row.0);
        let attributes = group_by_key(keys, attributes, |row| row.0);
        let tags = group_by_key(keys, tags, |row| row.0);
        Ok(entities
            .into_iter()
            .zip(attributes.into_iter().zip(tags))
            .map(|(entity, (attributes, tags))| {
                entity.map(|(id, name)| Entity {
                    id,
                    name,
                    attributes: attributes.into_iter().map(|(_, k, v)| (k, v)).collect(),
                    tags: tags.into_iter().map(|(_, label)| label).collect(),
                })
            })
            .collect())
    }
}

struct RelationshipsBatchFn;

#[async_trait]
impl BatchFunction<i64, Vec<Relationship>> for RelationshipsBatchFn {
    type Context = Arc<Store>;
    type Error = StoreError;

    async fn load(
        keys: &[i64],
        store: &Self::Context,
    ) -> Result<Vec<Vec<Relationship>>, StoreError> {
        let rows = match store.relationships_by_entity_ids(keys).await {
            Ok(rows) => rows,
            // A store that predates the relationships migration answers
            // every key with no rows instead of failing the frame.
            Err(StoreError::UndefinedRelation(_)) => Vec::new(),
            Err(other) => return Err(other),
        };
        Ok(group_by_key(keys, rows, |row| row.from_entity))
    }
}

#[tokio::main]
async fn main() {
    let store = Arc::new(Store {
        entities: vec![(1, "Alvarez Holdings".to_owned()), (2, "Dockside Warehouse".to_owned())],
        attributes: vec![
            (1, "registry".to_owned(), "B-44021".to_owned()),
            (1, "status".to_owned(), "dissolved".to_owned()),
        ],
        tags: vec![(1, "shell-company".to_owned()), (2, "location".to_owned())],
        relationships: Some(vec![Relationship {
            from_entity: 1,
            to_entity: 2,
            kind: "owns".to_owned(),
        }]),
    });

    let entities = Loader::new(EntityBatchFn, Arc::clone(&store));
    let relationships = Loader::new(RelationshipsBatchFn, Arc::clone(&store));

    // Issued together: one entity round-trip covers all three ids.
    let (a, b, missing) =
        futures::join!(entities.load(1), entities.load(2), entities.load(9));
    let a = a.unwrap().unwrap();
    assert_eq!(a.id, 1);
    assert_eq!(a.name, "Alvarez Holdings");
    assert_eq!(a.attributes.len(), 2);
    assert!(b.unwrap().unwrap().tags.contains(&"location".to_owned()));
    assert!(missing.unwrap().is_none());

    // One-to-many: entity 1 owns the warehouse, entity 2 owns nothing.
    let owned = relationships.load(1).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].to_entity, 2);
    assert_eq!(owned[0].kind, "owns");
    assert!(relationships.load(2).await.unwrap().is_empty());

    // Nullable foreign keys short-circuit without a store round-trip.
    assert!(entities.load_opt(None).await.unwrap().is_none());

    // Against a store that predates the relationships migration, the same
    // loader shape answers every key with no rows.
    let old_store = Arc::new(Store {
        entities: vec![(1, "Alvarez Holdings".to_owned())],
        attributes: Vec::new(),
        tags: Vec::new(),
        relationships: None,
    });
    let relationships = Loader::new(RelationshipsBatchFn, old_store);
    assert!(relationships.load(1).await.unwrap().is_empty());

    println!("all relation shapes resolved");
}
