use std::sync::Arc;

use api_types::{
    document::FileGet,
    expense::{
        ComplianceCheck, ExpenseGet, ExpenseRecord, ExpenseRegister, ExpensesByYear, UploadMeta,
    },
    person::Person,
};
use async_trait::async_trait;
use engine::{
    ConnectionConfig, Connector, DocumentStream, EngineError, ExpenseService, PendingAttachment,
    ResultEngine,
};
use futures::StreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url, multipart};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP binding of [`ExpenseService`].
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    config: ConnectionConfig,
}

impl Client {
    pub fn new(http: reqwest::Client, config: &ConnectionConfig) -> ResultEngine<Self> {
        let host = config.host.trim().trim_end_matches('/');
        let raw = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}/", config.port)
        } else {
            format!("http://{host}:{}/", config.port)
        };
        let base_url = Url::parse(&raw)
            .map_err(|err| EngineError::Connection(format!("invalid host {host}: {err}")))?;

        Ok(Self {
            base_url,
            http,
            config: config.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> ResultEngine<RequestBuilder> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|err| EngineError::Connection(format!("invalid endpoint {path}: {err}")))?;

        Ok(self
            .http
            .request(method, endpoint)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("x-taxreport-database", &self.config.database)
            .header("x-taxreport-share", &self.config.share)
            .header("x-taxreport-share-user", &self.config.share_username)
            .header("x-taxreport-share-password", &self.config.share_password))
    }

    async fn send(&self, request: RequestBuilder) -> ResultEngine<Response> {
        let res = request
            .send()
            .await
            .map_err(|err| EngineError::Connection(err.to_string()))?;

        if res.status().is_success() {
            return Ok(res);
        }
        Err(error_from(res).await)
    }

    async fn post_json<TReq: Serialize + ?Sized, TResp: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> ResultEngine<TResp> {
        let res = self.send(self.request(Method::POST, path)?.json(body)).await?;
        res.json::<TResp>()
            .await
            .map_err(|err| EngineError::Service(format!("invalid response from {path}: {err}")))
    }

    async fn post_json_unit<TReq: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &TReq,
    ) -> ResultEngine<()> {
        self.send(self.request(Method::POST, path)?.json(body))
            .await?;
        Ok(())
    }

    /// Like `send`, but a 404 is an empty answer rather than an error.
    async fn post_optional<TReq: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &TReq,
    ) -> ResultEngine<Option<Response>> {
        match self.send(self.request(Method::POST, path)?.json(body)).await {
            Ok(res) => Ok(Some(res)),
            Err(EngineError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Checks that the service answers and accepts the credentials.
    pub async fn probe(&self) -> ResultEngine<()> {
        self.send(self.request(Method::GET, "status")?).await?;
        Ok(())
    }
}

async fn error_from(res: Response) -> EngineError {
    let status = res.status();
    let body = res
        .json::<ErrorResponse>()
        .await
        .map(|err| err.error)
        .unwrap_or_else(|_| "unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EngineError::Connection(format!("credentials rejected: {body}"))
        }
        StatusCode::NOT_FOUND => EngineError::NotFound(body),
        StatusCode::UNPROCESSABLE_ENTITY => EngineError::Validation(body),
        _ => EngineError::Service(format!("{status}: {body}")),
    }
}

#[async_trait]
impl ExpenseService for Client {
    async fn find_persons(&self) -> ResultEngine<Vec<Person>> {
        self.post_json("persons/list", &serde_json::json!({})).await
    }

    async fn register_person(&self, person: &Person) -> ResultEngine<()> {
        self.post_json_unit("persons/register", person).await
    }

    async fn find_expenses_by_year(&self, year: &str) -> ResultEngine<Vec<ExpenseRecord>> {
        self.post_json(
            "expenses/list",
            &ExpensesByYear {
                year: year.to_string(),
            },
        )
        .await
    }

    async fn find_expense_by_id(&self, id: uuid::Uuid) -> ResultEngine<Option<ExpenseRecord>> {
        let Some(res) = self.post_optional("expenses/get", &ExpenseGet { id }).await? else {
            return Ok(None);
        };
        let record = res
            .json::<ExpenseRecord>()
            .await
            .map_err(|err| EngineError::Service(format!("invalid expense: {err}")))?;
        Ok(Some(record))
    }

    async fn register_expense(
        &self,
        record: &ExpenseRecord,
        uploads: &[PendingAttachment],
    ) -> ResultEngine<()> {
        let payload = ExpenseRegister {
            expense: record.clone(),
            uploads: uploads
                .iter()
                .map(|upload| UploadMeta {
                    name: upload.display_name.clone(),
                    kind: upload.kind,
                })
                .collect(),
        };
        let expense_part = multipart::Part::text(serde_json::to_string(&payload)?)
            .mime_str("application/json")
            .map_err(|err| EngineError::Service(err.to_string()))?;
        let mut form = multipart::Form::new().part("expense", expense_part);

        for upload in uploads {
            let file = tokio::fs::File::open(&upload.local_path)
                .await
                .map_err(|err| {
                    tracing::warn!(
                        path = %upload.local_path.display(),
                        "cannot read {}: {err}",
                        upload.display_name
                    );
                    err
                })?;
            let length = file.metadata().await?.len();
            let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
            let part = multipart::Part::stream_with_length(body, length)
                .file_name(upload.display_name.clone());
            form = form.part("upload", part);
        }

        self.send(self.request(Method::POST, "expenses/register")?.multipart(form))
            .await?;
        Ok(())
    }

    async fn run_compliance_check(&self, year: &str) -> ResultEngine<()> {
        self.post_json_unit(
            "compliance/check",
            &ComplianceCheck {
                year: year.to_string(),
            },
        )
        .await
    }

    async fn load_file(
        &self,
        directory: &str,
        filename: &str,
    ) -> ResultEngine<Option<DocumentStream>> {
        let payload = FileGet {
            directory: directory.to_string(),
            filename: filename.to_string(),
        };
        let Some(res) = self.post_optional("files/get", &payload).await? else {
            return Ok(None);
        };

        let stream = res
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(std::io::Error::other))
            .boxed();
        Ok(Some(stream))
    }
}

/// Opens [`Client`]s, checking reachability first.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    http: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, config: &ConnectionConfig) -> ResultEngine<Arc<dyn ExpenseService>> {
        let client = Client::new(self.http.clone(), config)?;
        client.probe().await?;
        Ok(Arc::new(client))
    }
}
