//! HTTP-backed resource services
//!
//! Organizations live at `/organizations[/{id}]`, environments at
//! `/organizations/{org}/environments[/{id}]`. Payloads may be bare or
//! wrapped in `{"data": ...}`.

use crate::networking::{ApiResponse, ApiSession, Method, RequestGateway, encode_component};
use crate::primitives::{ApiError, HarborError};
use serde_json::{Map, Value};
use tracing::debug;

use super::{FieldValues, Resource, ResourceCatalog, ResourceKind, ResourceService};

/// Items requested per `list` page
pub const PAGE_SIZE: usize = 100;

pub struct HttpResourceService<'a> {
    gateway: &'a RequestGateway<'a>,
    session: &'a ApiSession,
    kind: ResourceKind,
    collection: String,
}

impl<'a> HttpResourceService<'a> {
    pub fn organizations(gateway: &'a RequestGateway<'a>, session: &'a ApiSession) -> Self {
        Self {
            gateway,
            session,
            kind: ResourceKind::Organization,
            collection: "/organizations".to_string(),
        }
    }

    pub fn environments(
        gateway: &'a RequestGateway<'a>,
        session: &'a ApiSession,
        organization_id: &str,
    ) -> Self {
        Self {
            gateway,
            session,
            kind: ResourceKind::Environment,
            collection: format!(
                "/organizations/{}/environments",
                encode_component(organization_id)
            ),
        }
    }

    pub fn collection_path(&self) -> &str {
        &self.collection
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection, encode_component(id))
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, HarborError> {
        self.gateway.send(self.session, method, path, body)
    }

    fn page(&self, skip: usize) -> Result<Vec<Resource>, HarborError> {
        let path = format!("{}?skip={skip}&limit={PAGE_SIZE}", self.collection);
        let response = self.send(Method::Get, &path, None)?;
        let payload: Value = response.json()?;
        let items = list_items(&payload).ok_or_else(|| ApiError::Decode {
            reason: format!("expected a list of {}s", self.kind),
        })?;

        items
            .iter()
            .map(|item| parse_resource(item, self.kind))
            .collect::<Result<Vec<_>, _>>()
            .map_err(HarborError::from)
    }

    fn single(&self, response: &ApiResponse) -> Result<Resource, HarborError> {
        let payload: Value = response.json()?;
        let mut resource = parse_resource(unwrap_data(&payload), self.kind)?;
        if let Some(etag) = response.header("etag") {
            resource.etag = Some(etag.to_string());
        }
        Ok(resource)
    }
}

impl ResourceService for HttpResourceService<'_> {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Every item, fetched `PAGE_SIZE` at a time until a short page
    fn list(&self) -> Result<Vec<Resource>, HarborError> {
        let mut resources: Vec<Resource> = Vec::new();
        loop {
            let page = self.page(resources.len())?;
            let fetched = page.len();

            let restarted = !resources.is_empty()
                && page.first().map(|item| &item.id) == resources.first().map(|item| &item.id);
            if restarted {
                debug!(kind = %self.kind, "server ignored the page offset");
                break;
            }

            resources.extend(page);
            if fetched < PAGE_SIZE {
                break;
            }
        }
        debug!(kind = %self.kind, count = resources.len(), "listed resources");
        Ok(resources)
    }

    fn get(&self, id: &str) -> Result<Resource, HarborError> {
        let response = self.send(Method::Get, &self.item_path(id), None)?;
        self.single(&response)
    }

    fn create(&self, fields: &FieldValues) -> Result<Resource, HarborError> {
        let body = request_body(fields, true);
        let response = self.send(Method::Post, &self.collection, Some(&body))?;
        self.single(&response)
    }

    fn update(&self, id: &str, fields: &FieldValues) -> Result<Resource, HarborError> {
        let body = request_body(fields, false);
        let response = self.send(Method::Put, &self.item_path(id), Some(&body))?;
        self.single(&response)
    }

    fn delete(&self, id: &str) -> Result<(), HarborError> {
        self.send(Method::Delete, &self.item_path(id), None)?;
        Ok(())
    }
}

/// Services bound to one gateway and session
pub struct HttpResourceCatalog<'a> {
    gateway: &'a RequestGateway<'a>,
    session: &'a ApiSession,
}

impl<'a> HttpResourceCatalog<'a> {
    pub fn new(gateway: &'a RequestGateway<'a>, session: &'a ApiSession) -> Self {
        Self { gateway, session }
    }
}

impl ResourceCatalog for HttpResourceCatalog<'_> {
    fn service<'s>(
        &'s self,
        kind: ResourceKind,
        scope: Option<&str>,
    ) -> Result<Box<dyn ResourceService + 's>, HarborError> {
        match (kind, scope) {
            (ResourceKind::Organization, _) => Ok(Box::new(HttpResourceService::organizations(
                self.gateway,
                self.session,
            ))),
            (ResourceKind::Environment, Some(org)) if !org.trim().is_empty() => Ok(Box::new(
                HttpResourceService::environments(self.gateway, self.session, org),
            )),
            (ResourceKind::Environment, _) => Err(ApiError::Validation {
                message: "environments require an organization".to_string(),
                fields: vec!["org".to_string()],
            }
            .into()),
        }
    }
}

fn unwrap_data(payload: &Value) -> &Value {
    match payload.get("data") {
        Some(data) if !data.is_null() => data,
        _ => payload,
    }
}

fn list_items(payload: &Value) -> Option<&Vec<Value>> {
    let inner = unwrap_data(payload);
    inner
        .as_array()
        .or_else(|| inner.get("items").and_then(Value::as_array))
}

/// Build a resource from one JSON object; ids may be numbers or strings
pub fn parse_resource(value: &Value, kind: ResourceKind) -> Result<Resource, ApiError> {
    let id = match value.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(ApiError::Decode {
                reason: format!("{kind} without an id"),
            });
        }
    };

    Ok(Resource {
        id,
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        kind,
        etag: value
            .get("etag")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Creation omits a blank description; an update sends it to clear it
fn request_body(fields: &FieldValues, creating: bool) -> Value {
    let mut body = Map::new();
    for (field, value) in fields {
        if creating && field == "description" && value.trim().is_empty() {
            continue;
        }
        body.insert(field.clone(), Value::String(value.trim().to_string()));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    include!("http.test.rs");
}
