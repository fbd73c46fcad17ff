//! End-to-end CRUD against a real PostgreSQL.
//!
//! Requires `DATABASE_URL`; each test works inside its own throwaway schema and returns early
//! when no database is configured.

use mindsite::domain::schema::{CachingSchemaProvider, PostgresSchemaProvider};
use mindsite::infra::cache::MemoryBackend;
use mindsite::transport::http::{create_router, AppState};
use mindsite::{CacheService, CrudService};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Harness {
    base_url: String,
    client: reqwest::Client,
    admin_pool: PgPool,
    schema: String,
    server: tokio::task::JoinHandle<()>,
}

impl Harness {
    /// Creates a fresh schema, runs `ddl` inside it and serves the router on an ephemeral port.
    async fn start(ddl: &[&str]) -> Result<Option<Self>, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return Ok(None);
        };

        let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.subsec_nanos();
        let schema = format!("mindsite_test_{}_{}", std::process::id(), nanos);

        let admin_pool = PgPoolOptions::new().max_connections(1).connect(&url).await?;
        admin_pool
            .execute(format!("CREATE SCHEMA \"{}\"", schema).as_str())
            .await?;

        let search_path = format!("SET search_path TO \"{}\"", schema);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let stmt = search_path.clone();
                Box::pin(async move {
                    conn.execute(stmt.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await?;
        for statement in ddl {
            pool.execute(*statement).await?;
        }

        let provider = CachingSchemaProvider::new(PostgresSchemaProvider::new(
            pool.clone(),
            schema.clone(),
        ));
        let collections: BTreeMap<String, String> = [
            ("thoughts".to_string(), "Thoughts".to_string()),
            ("passions".to_string(), "Passions".to_string()),
        ]
        .into();
        let state = AppState {
            crud: Arc::new(CrudService::new(pool, Arc::new(provider))),
            cache: Arc::new(CacheService::with_backend(
                Arc::new(MemoryBackend::new()),
                Duration::from_secs(60),
            )),
            collections: Arc::new(collections),
            collection_ttl: Duration::from_secs(300),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = create_router(state);
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Ok(Some(Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            admin_pool,
            schema,
            server,
        }))
    }

    async fn get(&self, path: &str) -> Result<(u16, Value), reqwest::Error> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    async fn post(&self, path: &str, body: Value) -> Result<(u16, Value), reqwest::Error> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    async fn delete(&self, path: &str) -> Result<(u16, Value), reqwest::Error> {
        let resp = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    async fn finish(self) -> TestResult {
        self.server.abort();
        self.admin_pool
            .execute(format!("DROP SCHEMA \"{}\" CASCADE", self.schema).as_str())
            .await?;
        Ok(())
    }
}

const PASSIONS: &str = r#"CREATE TABLE "Passions" (
    id SERIAL PRIMARY KEY,
    topic VARCHAR(50) NOT NULL,
    "hasTales" BOOLEAN NOT NULL DEFAULT FALSE
)"#;

const THOUGHTS: &str = r#"CREATE TABLE "Thoughts" (
    id SERIAL PRIMARY KEY,
    title VARCHAR(200),
    score INTEGER,
    weight NUMERIC(6,2) NOT NULL DEFAULT 1,
    happened DATE,
    noted TIMESTAMP,
    body TEXT
)"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn passions_scenario() -> TestResult {
    let Some(h) = Harness::start(&[PASSIONS]).await? else {
        return Ok(());
    };

    let (status, body) = h.get("/admin/tables").await?;
    assert_eq!(status, 200);
    assert_eq!(body["tables"], json!(["Passions"]));

    let (status, body) = h.get("/admin/get-columns?table=Passions").await?;
    assert_eq!(status, 200);
    let types: Vec<(String, String)> = body["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["name"].as_str().unwrap().to_string(),
                c["input_type"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        types,
        vec![
            ("id".to_string(), "number".to_string()),
            ("topic".to_string(), "text".to_string()),
            ("hasTales".to_string(), "checkbox".to_string()),
        ]
    );
    assert_eq!(body["columns"][0]["primary_key"], json!(true));
    assert_eq!(body["columns"][1]["max_length"], json!(50));

    let (status, body) = h
        .post(
            "/admin/create",
            json!({"table_name": "Passions", "data": {"topic": "Chess", "hasTales": ""}}),
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["success"], json!(true));
    assert!(body["id"].is_i64());
    assert_eq!(body["fields"]["hasTales"], json!(false));

    let id = body["id"].as_i64().unwrap();
    let (status, body) = h.get(&format!("/admin/object?table=Passions&id={}", id)).await?;
    assert_eq!(status, 200);
    assert_eq!(body["object"]["topic"], json!("Chess"));
    assert_eq!(body["object"]["hasTales"], json!(false));

    h.finish().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lenient_and_nullable_coercion() -> TestResult {
    let Some(h) = Harness::start(&[THOUGHTS]).await? else {
        return Ok(());
    };

    let (status, body) = h
        .post(
            "/admin/create",
            json!({"table_name": "Thoughts", "data": {
                "id": 999,
                "title": "",
                "score": "",
                "weight": "heavy",
                "happened": "",
                "noted": "2024-03-09T14:30",
                "body": "long form"
            }}),
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_ne!(body["id"], json!(999), "primary key is never taken from the payload");

    let (_, body) = h.get("/admin/objects?table=Thoughts").await?;
    let row = &body["objects"][0];
    assert_eq!(row["title"], Value::Null);
    assert_eq!(row["score"], Value::Null);
    assert_eq!(row["weight"].as_f64(), Some(0.0));
    assert_eq!(row["happened"], Value::Null);
    assert_eq!(row["noted"], json!("2024-03-09T14:30:00"));

    let (status, body) = h
        .post(
            "/admin/create",
            json!({"table_name": "Thoughts", "data": {"noted": "last tuesday"}}),
        )
        .await?;
    assert_eq!(status, 500);
    assert_eq!(body["code"], json!("conversion_error"));
    assert_eq!(body["column"], json!("noted"));

    let (status, body) = h
        .post("/admin/create", json!({"table_name": "Thoughts", "data": {"id": 5}}))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], json!("empty_payload"));

    let (status, body) = h
        .post("/admin/create", json!({"table_name": "Thoughts", "data": {"bogus": "x"}}))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], json!("empty_payload"));
    let (_, body) = h.get("/admin/objects?table=Thoughts").await?;
    assert_eq!(body["objects"].as_array().map(Vec::len), Some(1));

    h.finish().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn columns_added_after_first_use_are_written() -> TestResult {
    let Some(h) = Harness::start(&[PASSIONS]).await? else {
        return Ok(());
    };

    let (status, body) = h
        .post("/admin/create", json!({"table_name": "Passions", "data": {"topic": "Chess"}}))
        .await?;
    assert_eq!(status, 200, "{body}");

    h.admin_pool
        .execute(format!("ALTER TABLE \"{}\".\"Passions\" ADD COLUMN mood TEXT", h.schema).as_str())
        .await?;

    let (status, body) = h
        .post(
            "/admin/create",
            json!({"table_name": "Passions", "data": {"topic": "Go", "mood": "calm"}}),
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["fields"]["mood"], json!("calm"));

    let id = body["id"].as_i64().unwrap();
    let (_, body) = h.get(&format!("/admin/object?table=Passions&id={}", id)).await?;
    assert_eq!(body["object"]["mood"], json!("calm"));

    h.admin_pool
        .execute(format!("ALTER TABLE \"{}\".\"Passions\" ADD COLUMN rank INTEGER DEFAULT 5", h.schema).as_str())
        .await?;
    let (status, _) = h.post("/admin/refresh-schema", json!({})).await?;
    assert_eq!(status, 200);
    let (_, body) = h.get("/admin/get-columns?table=Passions").await?;
    let rank = body["columns"]
        .as_array()
        .and_then(|cols| cols.iter().find(|c| c["name"] == json!("rank")))
        .cloned()
        .unwrap_or(Value::Null);
    assert_eq!(rank["input_type"], json!("number"));
    assert_eq!(rank["default"], json!("5"));

    h.finish().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_and_delete() -> TestResult {
    let Some(h) = Harness::start(&[THOUGHTS]).await? else {
        return Ok(());
    };

    let (_, created) = h
        .post(
            "/admin/create",
            json!({"table_name": "Thoughts", "data": {"title": "draft", "score": "3"}}),
        )
        .await?;
    let id = created["id"].clone();

    let (status, body) = h
        .post("/admin/update", json!({"table_name": "Thoughts", "data": {"id": id}}))
        .await?;
    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().starts_with("No changes"));

    let (status, _) = h
        .post(
            "/admin/update",
            json!({"table_name": "Thoughts", "data": {"id": id, "title": "final"}}),
        )
        .await?;
    assert_eq!(status, 200);

    let (_, body) = h.get(&format!("/admin/object?table=Thoughts&id={}", id)).await?;
    assert_eq!(body["object"]["title"], json!("final"));
    assert_eq!(body["object"]["score"], json!(3), "absent fields are untouched");

    let (status, body) = h
        .post("/admin/update", json!({"table_name": "Thoughts", "data": {"title": "x"}}))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], json!("missing_field"));

    let path = format!("/admin/delete?table=Thoughts&id={}", id);
    let (status, _) = h.delete(&path).await?;
    assert_eq!(status, 200);
    let (status, body) = h.delete(&path).await?;
    assert_eq!(status, 404);
    assert_eq!(body["code"], json!("row_not_found"));

    let (status, _) = h.get("/admin/get-columns?table=Ghosts").await?;
    assert_eq!(status, 404);

    h.finish().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn collection_listing_is_cached_and_evicted() -> TestResult {
    let Some(h) = Harness::start(&[THOUGHTS]).await? else {
        return Ok(());
    };

    let (status, body) = h.get("/thoughts/data").await?;
    assert_eq!(status, 200);
    assert_eq!(body["objects"], json!([]));

    // A write outside the admin surface is not seen until the entry expires.
    h.admin_pool
        .execute(format!("INSERT INTO \"{}\".\"Thoughts\" (title) VALUES ('direct')", h.schema).as_str())
        .await?;
    let (_, body) = h.get("/thoughts/data").await?;
    assert_eq!(body["objects"], json!([]));

    // Admin writes evict the cached listing.
    h.post(
        "/admin/create",
        json!({"table_name": "Thoughts", "data": {"title": "via admin"}}),
    )
    .await?;
    let (_, body) = h.get("/thoughts/data").await?;
    assert_eq!(body["objects"].as_array().map(Vec::len), Some(2));

    h.finish().await
}
