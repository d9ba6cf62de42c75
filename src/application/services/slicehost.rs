//! Slicehost slices

use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::services::objects::require;
use crate::application::services::polling::Polling;
use crate::application::{ApplicationError, ApplicationResult, Ui};
use crate::domain::cloud::name_for;
use crate::domain::{classify_addresses, NamedResource, ServerRequest, Slice};
use crate::infrastructure::traits::SlicehostApi;

pub const DEFAULT_FLAVOR: &str = "1";
pub const DEFAULT_IMAGE: &str = "49";
pub const DEFAULT_SLICE_NAME: &str = "chef-node";

/// A slice with image and flavor resolved to names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRow {
    pub id: String,
    pub name: String,
    pub private_ip: String,
    pub public_ip: String,
    pub image: String,
    pub flavor: String,
}

#[derive(Debug, Clone, Default)]
pub struct SliceCreate {
    pub name: Option<String>,
    pub flavor: Option<String>,
    pub image: Option<String>,
}

pub struct SlicehostService {
    api: Arc<dyn SlicehostApi>,
    ui: Arc<Ui>,
    default_name: Option<String>,
    polling: Polling,
}

impl SlicehostService {
    pub fn new(
        api: Arc<dyn SlicehostApi>,
        ui: Arc<Ui>,
        default_name: Option<String>,
        polling: Polling,
    ) -> Self {
        Self {
            api,
            ui,
            default_name,
            polling,
        }
    }

    pub fn images(&self) -> ApplicationResult<Vec<NamedResource>> {
        Ok(self.api.list_images()?)
    }

    pub fn list(&self) -> ApplicationResult<Vec<SliceRow>> {
        let images = self.api.list_images()?;
        let flavors = self.api.list_flavors()?;
        let slices = self.api.list_slices()?;
        Ok(slices
            .iter()
            .map(|slice| {
                let (public, private) = classify_addresses(&slice.addresses);
                SliceRow {
                    id: slice.id.clone(),
                    name: slice.name.clone(),
                    private_ip: private.first().cloned().unwrap_or_default(),
                    public_ip: public.first().cloned().unwrap_or_default(),
                    image: name_for(&images, &slice.image_id),
                    flavor: name_for(&flavors, &slice.flavor_id),
                }
            })
            .collect())
    }

    /// Create a slice and wait until it is active.
    pub fn create(&self, options: &SliceCreate) -> ApplicationResult<Slice> {
        let request = ServerRequest {
            name: options
                .name
                .clone()
                .or_else(|| self.default_name.clone())
                .unwrap_or_else(|| DEFAULT_SLICE_NAME.to_string()),
            flavor_id: options
                .flavor
                .clone()
                .unwrap_or_else(|| DEFAULT_FLAVOR.to_string()),
            image_id: options
                .image
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        };
        let flavors = self.api.list_flavors()?;
        let images = self.api.list_images()?;
        let created = self.api.create_slice(&request)?;

        let (public, private) = classify_addresses(&created.addresses);
        self.ui.field("Name", &created.name);
        self.ui.field("Flavor", &name_for(&flavors, &created.flavor_id));
        self.ui.field("Image", &name_for(&images, &created.image_id));
        self.ui.field("Public Address", &public.first().cloned().unwrap_or_default());
        self.ui.field("Private Address", &private.first().cloned().unwrap_or_default());
        self.ui.field("Password", created.root_password.as_deref().unwrap_or(""));

        self.ui.print("Requesting status of server");
        let slice = self.polling.wait_until(
            &self.ui,
            &format!("slice {}", created.name),
            created.clone(),
            |slice| {
                if slice.is_failed() {
                    return Err(ApplicationError::fatal(format!(
                        "Slice {} entered state {}",
                        slice.name, slice.status
                    )));
                }
                Ok(slice.is_active())
            },
            || {
                let slice = self.api.get_slice(&created.id)?;
                debug!("slicehost: {} is {}", slice.id, slice.status);
                Ok(slice)
            },
        )?;
        self.ui.say("");
        self.ui.say("Server ready");
        Ok(slice)
    }

    /// Delete the slice named `name`; unknown names only warn.
    pub fn delete(&self, name: Option<&str>) -> ApplicationResult<()> {
        let name = require(name, "You must specify a slice name")?;
        let slices = self.api.list_slices()?;
        let Some(slice) = slices.into_iter().find(|s| s.name == name) else {
            warn!("I can't find a slice named {}", name);
            return Ok(());
        };
        self.ui.confirm(&format!(
            "Do you really want to delete server ID {} named {}",
            slice.id, slice.name
        ))?;
        match self.api.delete_slice(&slice.id) {
            Ok(()) => warn!("Deleted server {} named {}", slice.id, slice.name),
            Err(e) => {
                debug!("slicehost: delete failed: {}", e);
                warn!(
                    "There was a problem deleting {}, check your slice manager",
                    slice.name
                );
            }
        }
        Ok(())
    }
}
