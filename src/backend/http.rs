//! HTTP client for the content API.

use crate::backend::{
    ContentBackend, ElementUpdate, ImageFile, NewContentElement, NewSubSection, SubSectionUpdate,
    TranslationUpsert, UploadedImage,
};
use crate::config::Config;
use crate::error::BackendError;
use crate::model::{ContentElement, SubSection};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Some endpoints wrap their payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

/// [`ContentBackend`] over the content REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    read_retry: RetryPolicy,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Request {
                operation: "build http client",
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            read_retry: RetryPolicy::read_request(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            &config.backend_api_url,
            config.backend_api_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Replace the retry policy used for the subsection lookup.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| BackendError::Request { operation, source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(BackendError::Status {
                operation,
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T, BackendError> {
        let envelope: Envelope<T> = response.json().await.map_err(|e| BackendError::Decode {
            operation,
            message: e.to_string(),
        })?;
        Ok(envelope.into_inner())
    }

    async fn fetch_complete(&self, slug: &str) -> Result<Option<SubSection>, BackendError> {
        const OPERATION: &str = "get subsection by slug";
        let request = self
            .client
            .get(self.url(&format!("/subsections/slug/{}/complete", slug)));

        match self.send(OPERATION, request).await {
            Ok(response) => Ok(Some(Self::json(OPERATION, response).await?)),
            Err(BackendError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ContentBackend for HttpBackend {
    async fn create_sub_section(&self, data: NewSubSection) -> Result<SubSection, BackendError> {
        const OPERATION: &str = "create subsection";
        let request = self.client.post(self.url("/subsections")).json(&data);
        let response = self.send(OPERATION, request).await?;
        Self::json(OPERATION, response).await
    }

    async fn update_sub_section(&self, id: &str, data: SubSectionUpdate) -> Result<(), BackendError> {
        let request = self.client.put(self.url(&format!("/subsections/{}", id))).json(&data);
        self.send("update subsection", request).await?;
        Ok(())
    }

    async fn get_complete_by_sub_section_slug(
        &self,
        slug: &str,
    ) -> Result<Option<SubSection>, BackendError> {
        self.read_retry
            .run(
                &format!("Fetch subsection '{}'", slug),
                || self.fetch_complete(slug),
                BackendError::is_transient,
            )
            .await
    }

    async fn create_content_element(
        &self,
        data: NewContentElement,
    ) -> Result<ContentElement, BackendError> {
        const OPERATION: &str = "create content element";
        debug!("Creating element '{}' (order {})", data.name, data.order);
        let request = self.client.post(self.url("/content-elements")).json(&data);
        let response = self.send(OPERATION, request).await?;
        Self::json(OPERATION, response).await
    }

    async fn update_content_element(&self, id: &str, data: ElementUpdate) -> Result<(), BackendError> {
        let request = self
            .client
            .put(self.url(&format!("/content-elements/{}", id)))
            .json(&data);
        self.send("update content element", request).await?;
        Ok(())
    }

    async fn delete_content_element(&self, id: &str) -> Result<(), BackendError> {
        let request = self.client.delete(self.url(&format!("/content-elements/{}", id)));
        self.send("delete content element", request).await?;
        Ok(())
    }

    async fn bulk_upsert_translations(
        &self,
        translations: Vec<TranslationUpsert>,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url("/translations/bulk"))
            .json(&translations);
        self.send("bulk upsert translations", request).await?;
        Ok(())
    }

    async fn upload_element_image(
        &self,
        element_id: &str,
        file: ImageFile,
    ) -> Result<UploadedImage, BackendError> {
        const OPERATION: &str = "upload element image";
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(|source| BackendError::Request {
                operation: OPERATION,
                source,
            })?;
        let form = reqwest::multipart::Form::new().part("image", part);
        let request = self
            .client
            .post(self.url(&format!("/content-elements/{}/image", element_id)))
            .multipart(form);
        let response = self.send(OPERATION, request).await?;
        Self::json(OPERATION, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementType;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&server.uri(), Some("test-token".to_string()), Duration::from_secs(5))
            .unwrap()
            .with_read_retry(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    fn sub_section_json() -> serde_json::Value {
        serde_json::json!({
            "_id": "sub-1",
            "name": "hero",
            "section": "sec-1",
            "languages": ["lang-en"],
            "elements": [{
                "_id": "el-1",
                "name": "Item 1 - Title",
                "type": "text",
                "order": 0,
                "parent": "sub-1",
                "defaultContent": "",
                "translations": []
            }]
        })
    }

    // ==================== Read Tests ====================

    #[tokio::test]
    async fn test_get_complete_by_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subsections/slug/hero/complete"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sub_section_json()))
            .expect(1)
            .mount(&server)
            .await;

        let sub = backend(&server)
            .get_complete_by_sub_section_slug("hero")
            .await
            .unwrap()
            .expect("Should find subsection");
        assert_eq!(sub.id, "sub-1");
        assert_eq!(sub.elements.len(), 1);
    }

    #[tokio::test]
    async fn test_get_complete_unwraps_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subsections/slug/hero/complete"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": sub_section_json()})),
            )
            .mount(&server)
            .await;

        let sub = backend(&server).get_complete_by_sub_section_slug("hero").await.unwrap();
        assert_eq!(sub.map(|s| s.slug), Some("hero".to_string()));
    }

    #[tokio::test]
    async fn test_get_complete_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subsections/slug/missing/complete"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend(&server).get_complete_by_sub_section_slug("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_complete_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subsections/slug/hero/complete"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = backend(&server).get_complete_by_sub_section_slug("hero").await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_get_complete_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subsections/slug/hero/complete"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend(&server).get_complete_by_sub_section_slug("hero").await.unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
    }

    // ==================== Mutation Tests ====================

    #[tokio::test]
    async fn test_create_content_element_posts_payload() {
        let server = MockServer::start().await;
        let data = NewContentElement {
            name: "Item 1 - Url".to_string(),
            element_type: ElementType::Text,
            parent: "sub-1".to_string(),
            order: 1,
            default_content: String::new(),
            metadata: None,
        };
        Mock::given(method("POST"))
            .and(path("/api/content-elements"))
            .and(body_json(&data))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "_id": "el-9",
                "name": "Item 1 - Url",
                "type": "text",
                "order": 1,
                "parent": "sub-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let element = backend(&server).create_content_element(data).await.unwrap();
        assert_eq!(element.id, "el-9");
        assert!(element.translations.is_empty());
    }

    #[tokio::test]
    async fn test_mutations_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/content-elements/el-1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend(&server).delete_content_element("el-1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bulk_upsert_sends_array() {
        let server = MockServer::start().await;
        let rows = vec![TranslationUpsert {
            content: "https://x".to_string(),
            language: "lang-en".to_string(),
            content_element: "el-1".to_string(),
            is_active: true,
        }];
        Mock::given(method("POST"))
            .and(path("/api/translations/bulk"))
            .and(body_json(serde_json::json!([{
                "content": "https://x",
                "language": "lang-en",
                "contentElement": "el-1",
                "isActive": true
            }])))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server).bulk_upsert_translations(rows).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_element_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/content-elements/el-3/image"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"imageUrl": "https://cdn/x.png"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let uploaded = backend(&server)
            .upload_element_image("el-3", ImageFile::new("x.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(uploaded.image_url, "https://cdn/x.png");
    }

    #[tokio::test]
    async fn test_update_without_token_has_no_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/content-elements/el-1"))
            .and(body_json(serde_json::json!({"name": "Item 1 - Title", "order": 0})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&format!("{}/", server.uri()), None, Duration::from_secs(5)).unwrap();
        backend
            .update_content_element(
                "el-1",
                ElementUpdate {
                    name: Some("Item 1 - Title".to_string()),
                    order: Some(0),
                    metadata: None,
                },
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }
}
