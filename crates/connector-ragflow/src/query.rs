use serde::Serialize;

/// Query parameters of `GET /api/v1/datasets/{dataset_id}/documents`.
///
/// Every parameter is always sent, empty strings included; the service treats
/// an empty filter as "no filter".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListDocumentsQuery {
    pub page: u32,
    pub page_size: u32,
    pub orderby: String,
    pub desc: bool,
    pub keywords: String,
    pub id: String,
    pub name: String,
}

impl Default for ListDocumentsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            orderby: "create_time".to_string(),
            desc: true,
            keywords: String::new(),
            id: String::new(),
            name: String::new(),
        }
    }
}

impl ListDocumentsQuery {
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn orderby(mut self, field: impl Into<String>) -> Self {
        self.orderby = field.into();
        self
    }

    pub fn desc(mut self, desc: bool) -> Self {
        self.desc = desc;
        self
    }

    pub fn keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = keywords.into();
        self
    }

    /// Filters by document id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Filters by exact document name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Optional filters of `GET /api/v1/datasets`. Unset fields are not sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListDatasetsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ListDatasetsQuery {
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
