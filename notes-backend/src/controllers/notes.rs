//! Notes REST API: CRUD over the `notes` table.
//!
//! Each handler validates its input first, then performs exactly one storage
//! call through the injected [`NoteStore`](crate::db::NoteStore).

use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::web::{self, Either, EitherExtractError};
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse};
use notes_types::{CreatedNote, MessageResponse, NotePayload};

use super::error::ApiError;
use crate::models::{note, Note, NoteDraft};
use crate::AppState;

/// Note body posted as JSON or as an HTML form. Every extraction failure,
/// including an oversized body, comes back as an [`ApiError`].
pub struct NoteBody(NotePayload);

impl NoteBody {
    fn into_draft(self) -> Result<NoteDraft, ApiError> {
        let NotePayload { title, content } = self.0;
        Ok(NoteDraft::new(title, content)?)
    }
}

impl FromRequest for NoteBody {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let is_form = req.content_type() == "application/x-www-form-urlencoded";
        let body =
            Either::<web::Json<NotePayload>, web::Form<NotePayload>>::from_request(req, payload);

        Box::pin(async move {
            match body.await {
                Ok(Either::Left(json)) => Ok(NoteBody(json.into_inner())),
                Ok(Either::Right(form)) => Ok(NoteBody(form.into_inner())),
                Err(EitherExtractError::Bytes(err)) => Err(ApiError::from_body_error(&err)),
                Err(EitherExtractError::Extract(json_err, form_err)) => {
                    // Report the parser that matches what the client claimed to send
                    let err = if is_form { form_err } else { json_err };
                    Err(ApiError::InvalidBody(err.to_string()))
                }
            }
        })
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/notes")
            .route(web::get().to(list_notes))
            .route(web::post().to(create_note)),
    )
    .service(
        web::resource("/api/notes/{id}")
            .route(web::get().to(get_note))
            .route(web::put().to(update_note))
            .route(web::delete().to(delete_note)),
    );
}

async fn list_notes(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let notes = state
        .store
        .list_notes()
        .await
        .map_err(|e| ApiError::storage("fetching notes", e))?;

    Ok(HttpResponse::Ok().json(notes))
}

async fn get_note(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    match state.store.get_note(&id).await {
        Ok(Some(note)) => Ok(HttpResponse::Ok().json(note)),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::storage("fetching note", e)),
    }
}

async fn create_note(
    state: web::Data<AppState>,
    body: NoteBody,
) -> Result<HttpResponse, ApiError> {
    let draft = body.into_draft()?;
    let note = Note::create(draft, note::now());

    state
        .store
        .create_note(&note)
        .await
        .map_err(|e| ApiError::storage("creating note", e))?;

    log::debug!("[NOTES] Created note {}", note.id);

    Ok(HttpResponse::Created().json(CreatedNote {
        id: note.id,
        title: note.title,
        content: note.content,
        message: "Note created successfully".to_string(),
    }))
}

async fn update_note(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: NoteBody,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let draft = body.into_draft()?;

    let updated = state
        .store
        .update_note(&id, &draft, note::now())
        .await
        .map_err(|e| ApiError::storage("updating note", e))?;

    if !updated {
        return Err(ApiError::NotFound);
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Note updated successfully")))
}

async fn delete_note(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let deleted = state
        .store
        .delete_note(&id)
        .await
        .map_err(|e| ApiError::storage("deleting note", e))?;

    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Note deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{self, MAX_BODY_BYTES};
    use crate::db::{NoteStore, SqliteStore};
    use actix_web::http::header::ContentType;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use notes_types::ErrorResponse;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    async fn test_state() -> (TempDir, web::Data<AppState>) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("notes.sqlite"), 2)
            .expect("Failed to open store");
        store.init_schema().await.expect("Failed to init schema");
        let state = web::Data::new(AppState {
            store: Arc::new(store),
        });
        (dir, state)
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .configure(controllers::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_note_lifecycle() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .set_json(NotePayload::new("T1", "C1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: CreatedNote = test::read_body_json(resp).await;
        assert_eq!(created.title, "T1");
        assert_eq!(created.content, "C1");
        assert_eq!(created.message, "Note created successfully");
        let id = created.id;

        let req = test::TestRequest::get().uri(&format!("/api/notes/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched: Note = test::read_body_json(resp).await;
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.title, "T1");
        assert_eq!(fetched.content, "C1");
        assert_eq!(fetched.created_at, fetched.updated_at);

        tokio::time::sleep(Duration::from_millis(5)).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/notes/{}", id))
            .set_json(NotePayload::new("T2", "C2"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let msg: MessageResponse = test::read_body_json(resp).await;
        assert_eq!(msg.message, "Note updated successfully");

        let req = test::TestRequest::get().uri(&format!("/api/notes/{}", id)).to_request();
        let updated: Note = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.id, id);
        assert_eq!(updated.title, "T2");
        assert_eq!(updated.content, "C2");
        assert_eq!(updated.created_at, fetched.created_at);
        assert!(updated.updated_at > fetched.updated_at);

        let req = test::TestRequest::delete().uri(&format!("/api/notes/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let msg: MessageResponse = test::read_body_json(resp).await;
        assert_eq!(msg.message, "Note deleted successfully");

        let req = test::TestRequest::get().uri(&format!("/api/notes/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let err: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(err.error, "Note not found");
    }

    #[actix_web::test]
    async fn test_create_rejects_missing_or_empty_fields() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        let bodies = [
            json!({ "title": "", "content": "C" }),
            json!({ "title": "T", "content": "" }),
            json!({ "title": "T" }),
            json!({ "content": "C" }),
            json!({}),
            json!({ "title": null, "content": "C" }),
        ];

        for body in bodies {
            let req = test::TestRequest::post()
                .uri("/api/notes")
                .set_json(&body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            let err: ErrorResponse = test::read_body_json(resp).await;
            assert_eq!(err.error, "Title and content are required");
        }

        let req = test::TestRequest::get().uri("/api/notes").to_request();
        let notes: Vec<Note> = test::call_and_read_body_json(&app, req).await;
        assert!(notes.is_empty());
    }

    #[actix_web::test]
    async fn test_malformed_body_is_json_bad_request() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .insert_header(ContentType::json())
            .set_payload("{\"title\": \"T\", ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = test::read_body_json(resp).await;
        assert!(err.error.starts_with("Invalid request body"));

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .set_json(json!({ "title": 5, "content": "C" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_create_from_form_body() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .set_form([("title", "Form title"), ("content", "Form content")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: CreatedNote = test::read_body_json(resp).await;

        let stored = state.store.get_note(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Form title");
        assert_eq!(stored.content, "Form content");
    }

    #[actix_web::test]
    async fn test_unknown_id_is_not_found() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);
        let id = uuid::Uuid::new_v4().to_string();

        let req = test::TestRequest::get().uri(&format!("/api/notes/{}", id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::put()
            .uri(&format!("/api/notes/{}", id))
            .set_json(NotePayload::new("T", "C"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let err: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(err.error, "Note not found");

        let req = test::TestRequest::delete().uri(&format!("/api/notes/{}", id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_update_validates_before_lookup() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        // Missing fields win over a missing note: no storage call is made
        let req = test::TestRequest::put()
            .uri("/api/notes/whatever")
            .set_json(json!({ "title": "T" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_list_returns_most_recently_updated_first() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        let mut ids = Vec::new();
        for title in ["A", "B"] {
            let req = test::TestRequest::post()
                .uri("/api/notes")
                .set_json(NotePayload::new(title, "body"))
                .to_request();
            let created: CreatedNote = test::call_and_read_body_json(&app, req).await;
            ids.push(created.id);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let req = test::TestRequest::get().uri("/api/notes").to_request();
        let notes: Vec<Note> = test::call_and_read_body_json(&app, req).await;
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);

        let req = test::TestRequest::put()
            .uri(&format!("/api/notes/{}", ids[0]))
            .set_json(NotePayload::new("A", "edited"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/notes").to_request();
        let notes: Vec<Note> = test::call_and_read_body_json(&app, req).await;
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[actix_web::test]
    async fn test_large_note_under_limit_is_accepted() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);
        let content = "x".repeat(300 * 1024);

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .set_json(NotePayload::new("Big", content.as_str()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: CreatedNote = test::read_body_json(resp).await;

        let stored = state.store.get_note(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.content.len(), content.len());
    }

    #[actix_web::test]
    async fn test_oversized_body_is_json_payload_too_large() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);
        let content = "x".repeat(MAX_BODY_BYTES + 1);

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .set_json(NotePayload::new("Huge", content.as_str()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let err: ErrorResponse = test::read_body_json(resp).await;
        assert!(err.error.starts_with("Request body too large"));

        let req = test::TestRequest::get().uri("/api/notes").to_request();
        let notes: Vec<Note> = test::call_and_read_body_json(&app, req).await;
        assert!(notes.is_empty());
    }

    #[actix_web::test]
    async fn test_malformed_form_body_is_json_bad_request() {
        let (_dir, state) = test_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/notes")
            .insert_header(ContentType::form_url_encoded())
            .set_payload("title=A&title=B&content=C")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = test::read_body_json(resp).await;
        assert!(err.error.starts_with("Invalid request body"));
    }
}
