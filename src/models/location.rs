use crate::database::get_db;
use crate::error::ReportError;

use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct Department {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub site_id: ObjectId,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct Area {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub department_id: ObjectId,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct Equipment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub area_id: ObjectId,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct LocationNodeResponse {
    pub _id: String,
    pub name: String,
}

/// The four cascading picker levels. Selecting a node clears every deeper
/// selection, so a descendant can never outlive a change of its ancestor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocationSelection {
    pub site_id: Option<ObjectId>,
    pub department_id: Option<ObjectId>,
    pub area_id: Option<ObjectId>,
    pub equipment_id: Option<ObjectId>,
}

impl LocationSelection {
    pub fn is_empty(&self) -> bool {
        self.site_id.is_none()
            && self.department_id.is_none()
            && self.area_id.is_none()
            && self.equipment_id.is_none()
    }
    pub fn select_site(&mut self, site_id: Option<ObjectId>) {
        self.site_id = site_id;
        self.department_id = None;
        self.area_id = None;
        self.equipment_id = None;
    }
    pub fn select_department(&mut self, department_id: Option<ObjectId>) {
        self.department_id = department_id;
        self.area_id = None;
        self.equipment_id = None;
    }
    pub fn select_area(&mut self, area_id: Option<ObjectId>) {
        self.area_id = area_id;
        self.equipment_id = None;
    }
    pub fn select_equipment(&mut self, equipment_id: Option<ObjectId>) {
        self.equipment_id = equipment_id;
    }

    /// Validates the selected chain against the stored hierarchy. Site,
    /// department and area are required as a block once any location is
    /// given; equipment stays optional. Every child must actually belong to
    /// the selected parent, so a stale cross-branch pick is rejected even
    /// when the caller skipped the cascading clears. Returns the resolved
    /// site for denormalization.
    pub async fn resolve(&self) -> Result<Option<Site>, ReportError> {
        if self.is_empty() {
            return Ok(None);
        }

        let (site_id, department_id, area_id) =
            match (self.site_id, self.department_id, self.area_id) {
                (Some(site_id), Some(department_id), Some(area_id)) => {
                    (site_id, department_id, area_id)
                }
                _ => return Err(ReportError::Validation("LOCATION_SELECTION_INCOMPLETE")),
            };

        let site = Site::find_by_id(&site_id)
            .await?
            .ok_or(ReportError::NotFound("SITE_NOT_FOUND"))?;
        let department = Department::find_by_id(&department_id)
            .await?
            .ok_or(ReportError::NotFound("DEPARTMENT_NOT_FOUND"))?;
        if department.site_id != site_id {
            return Err(ReportError::Validation("DEPARTMENT_SITE_MISMATCH"));
        }
        let area = Area::find_by_id(&area_id)
            .await?
            .ok_or(ReportError::NotFound("AREA_NOT_FOUND"))?;
        if area.department_id != department_id {
            return Err(ReportError::Validation("AREA_DEPARTMENT_MISMATCH"));
        }
        if let Some(equipment_id) = self.equipment_id {
            let equipment = Equipment::find_by_id(&equipment_id)
                .await?
                .ok_or(ReportError::NotFound("EQUIPMENT_NOT_FOUND"))?;
            if equipment.area_id != area_id {
                return Err(ReportError::Validation("EQUIPMENT_AREA_MISMATCH"));
            }
        }

        Ok(Some(site))
    }
}

/// Children of an unknown parent are simply an empty set, never an error;
/// the pickers treat empty as "no children".
async fn find_children(
    collection_name: &'static str,
    filter: Document,
) -> Result<Vec<LocationNodeResponse>, ReportError> {
    let db: Database = get_db();
    let collection: Collection<Document> = db.collection::<Document>(collection_name);

    let pipeline = vec![
        doc! { "$match": filter },
        doc! { "$sort": { "name": 1 } },
        doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "name": "$name",
            }
        },
    ];

    let mut cursor = collection
        .aggregate(pipeline, None)
        .await
        .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;
    let mut nodes: Vec<LocationNodeResponse> = Vec::new();
    while let Some(Ok(doc)) = cursor.next().await {
        if let Ok(node) = from_document::<LocationNodeResponse>(doc) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

impl Site {
    pub async fn find_many() -> Result<Vec<LocationNodeResponse>, ReportError> {
        find_children("sites", doc! {}).await
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Site>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Site> = db.collection::<Site>("sites");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
}
impl Department {
    pub async fn find_by_site(site_id: &ObjectId) -> Result<Vec<LocationNodeResponse>, ReportError> {
        find_children("departments", doc! { "site_id": site_id }).await
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Department>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Department> = db.collection::<Department>("departments");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
}
impl Area {
    pub async fn find_by_department(
        department_id: &ObjectId,
    ) -> Result<Vec<LocationNodeResponse>, ReportError> {
        find_children("areas", doc! { "department_id": department_id }).await
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Area>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Area> = db.collection::<Area>("areas");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
}
impl Equipment {
    pub async fn find_by_area(area_id: &ObjectId) -> Result<Vec<LocationNodeResponse>, ReportError> {
        find_children("equipment", doc! { "area_id": area_id }).await
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Equipment>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Equipment> = db.collection::<Equipment>("equipment");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_selection() -> LocationSelection {
        LocationSelection {
            site_id: Some(ObjectId::new()),
            department_id: Some(ObjectId::new()),
            area_id: Some(ObjectId::new()),
            equipment_id: Some(ObjectId::new()),
        }
    }

    #[test]
    fn selecting_site_clears_descendants() {
        let mut selection = full_selection();
        let new_site = ObjectId::new();

        selection.select_site(Some(new_site));

        assert_eq!(selection.site_id, Some(new_site));
        assert_eq!(selection.department_id, None);
        assert_eq!(selection.area_id, None);
        assert_eq!(selection.equipment_id, None);
    }

    #[test]
    fn selecting_department_clears_area_and_equipment() {
        let mut selection = full_selection();
        let site_id = selection.site_id;
        let new_department = ObjectId::new();

        selection.select_department(Some(new_department));

        assert_eq!(selection.site_id, site_id);
        assert_eq!(selection.department_id, Some(new_department));
        assert_eq!(selection.area_id, None);
        assert_eq!(selection.equipment_id, None);
    }

    #[test]
    fn selecting_area_clears_equipment_only() {
        let mut selection = full_selection();
        let new_area = ObjectId::new();

        selection.select_area(Some(new_area));

        assert!(selection.site_id.is_some());
        assert!(selection.department_id.is_some());
        assert_eq!(selection.area_id, Some(new_area));
        assert_eq!(selection.equipment_id, None);
    }

    #[test]
    fn clearing_site_empties_selection() {
        let mut selection = full_selection();

        selection.select_site(None);

        assert!(selection.is_empty());
    }

    #[test]
    fn default_selection_is_empty() {
        assert!(LocationSelection::default().is_empty());
    }
}
