//! HTTP client for the recipe service JSON API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;

use super::RecipeService;
use crate::config::Config;
use crate::errors::{ClientError, ClientResult};
use crate::models::{
    AddRecipesToTabRequest, BackfillResult, CreateTabRequest, DailySuggestion, ExportRequest,
    GenerateRequest, GenerateResponse, ImportResult, ImportSource, RateRecipeRequest, Recipe,
    RecipePage, RecipeQuery, SaveRecipeRequest, Tab, TabId, TopIngredient, UpdateTabRequest,
    UploadFile, UrlImportRequest, UserPreferences,
};

/// HTTP implementation of [`RecipeService`].
#[derive(Clone)]
pub struct HttpRecipeService {
    base_url: String,
    client: Client,
}

impl HttpRecipeService {
    /// Create a client for the configured API base URL.
    pub fn new(config: &Config) -> ClientResult<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| ClientError::Validation("Invalid API key".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn recipe_url(&self, id: &str, suffix: &str) -> String {
        self.url(&format!("/recipes/{}{}", urlencoding::encode(id), suffix))
    }

    /// Decode a JSON body, mapping non-success statuses to typed errors.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> ClientResult<T> {
        let response = check_status(response).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Check the status of a response whose body carries nothing we need.
    async fn expect_success(&self, response: Response) -> ClientResult<()> {
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), body = %body, "Recipe service returned an error");
    Err(ClientError::from_status(status.as_u16(), &body))
}

fn file_part(file: &UploadFile) -> Part {
    Part::bytes(file.bytes.clone()).file_name(file.file_name.clone())
}

#[async_trait]
impl RecipeService for HttpRecipeService {
    async fn list_recipes(&self, query: &RecipeQuery) -> ClientResult<RecipePage> {
        let response = self
            .client
            .get(self.url("/recipes/all"))
            .query(query)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn list_saved(&self, page: u32, per_page: u32) -> ClientResult<RecipePage> {
        let response = self
            .client
            .get(self.url("/recipes"))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn get_recipe(&self, id: &str) -> ClientResult<Recipe> {
        let response = self.client.get(self.recipe_url(id, "")).send().await?;
        self.handle_response(response).await
    }

    async fn generate(&self, request: &GenerateRequest) -> ClientResult<Vec<Recipe>> {
        let response = self
            .client
            .post(self.url("/recipes/generate"))
            .json(request)
            .send()
            .await?;
        let body: GenerateResponse = self.handle_response(response).await?;
        Ok(body.recipes)
    }

    async fn save_recipe(&self, id: &str, notes: Option<&str>) -> ClientResult<Recipe> {
        let body = SaveRecipeRequest {
            notes: notes.map(str::to_string),
        };
        let response = self
            .client
            .post(self.recipe_url(id, "/save"))
            .json(&body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn unsave_recipe(&self, id: &str) -> ClientResult<()> {
        let response = self.client.delete(self.recipe_url(id, "/save")).send().await?;
        self.expect_success(response).await
    }

    async fn rate_recipe(&self, id: &str, rating: u8) -> ClientResult<Recipe> {
        let response = self
            .client
            .post(self.recipe_url(id, "/rate"))
            .json(&RateRecipeRequest { rating })
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn upload_image(&self, id: &str, image: &UploadFile) -> ClientResult<Recipe> {
        let form = Form::new().part("file", file_part(image));
        let response = self
            .client
            .post(self.recipe_url(id, "/image"))
            .multipart(form)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn delete_image(&self, id: &str) -> ClientResult<()> {
        let response = self.client.delete(self.recipe_url(id, "/image")).send().await?;
        self.expect_success(response).await
    }

    async fn import(&self, source: &ImportSource) -> ClientResult<ImportResult> {
        let request = match source {
            ImportSource::Paprika(file) => self
                .client
                .post(self.url("/paprika/import"))
                .multipart(Form::new().part("file", file_part(file))),
            ImportSource::Url(url) => self
                .client
                .post(self.url("/import/url"))
                .json(&UrlImportRequest { url: url.clone() }),
            ImportSource::Files(files) => {
                let form = files
                    .iter()
                    .fold(Form::new(), |form, file| form.part("files", file_part(file)));
                self.client.post(self.url("/import/files")).multipart(form)
            }
        };

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn export(&self, request: &ExportRequest) -> ClientResult<Vec<u8>> {
        let response = self.client.get(self.url(&request.path())).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn backfill_images(&self) -> ClientResult<BackfillResult> {
        let response = self
            .client
            .post(self.url("/recipes/backfill-images"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn list_tabs(&self) -> ClientResult<Vec<Tab>> {
        let response = self.client.get(self.url("/tabs")).send().await?;
        self.handle_response(response).await
    }

    async fn create_tab(&self, name: &str) -> ClientResult<Tab> {
        let response = self
            .client
            .post(self.url("/tabs"))
            .json(&CreateTabRequest {
                name: name.to_string(),
            })
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn update_tab(&self, id: TabId, request: &UpdateTabRequest) -> ClientResult<Tab> {
        let response = self
            .client
            .put(self.url(&format!("/tabs/{}", id)))
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn delete_tab(&self, id: TabId) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/tabs/{}", id)))
            .send()
            .await?;
        self.expect_success(response).await
    }

    async fn add_to_tab(&self, id: TabId, recipe_ids: &[String]) -> ClientResult<Tab> {
        let response = self
            .client
            .post(self.url(&format!("/tabs/{}/recipes", id)))
            .json(&AddRecipesToTabRequest {
                recipe_ids: recipe_ids.to_vec(),
            })
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn remove_from_tab(&self, id: TabId, recipe_id: &str) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.url(&format!(
                "/tabs/{}/recipes/{}",
                id,
                urlencoding::encode(recipe_id)
            )))
            .send()
            .await?;
        self.expect_success(response).await
    }

    async fn recipe_tab_ids(&self, recipe_id: &str) -> ClientResult<Vec<TabId>> {
        let response = self
            .client
            .get(self.url(&format!("/tabs/recipe/{}", urlencoding::encode(recipe_id))))
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn daily_suggestions(&self) -> ClientResult<DailySuggestion> {
        let response = self.client.get(self.url("/suggestions/daily")).send().await?;
        self.handle_response(response).await
    }

    async fn refresh_suggestions(&self) -> ClientResult<DailySuggestion> {
        let response = self
            .client
            .post(self.url("/suggestions/refresh"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn top_ingredients(&self, limit: u32) -> ClientResult<Vec<TopIngredient>> {
        let response = self
            .client
            .get(self.url("/stats/top-ingredients"))
            .query(&[("limit", limit)])
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn user_preferences(&self) -> ClientResult<UserPreferences> {
        let response = self.client.get(self.url("/stats/preferences")).send().await?;
        self.handle_response(response).await
    }
}
