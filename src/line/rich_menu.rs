// ABOUTME: Rich menu provisioning for the LINE bot (operator command)
// ABOUTME: Lays buttons out on a grid, replaces existing menus, uploads the image and sets the default

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use super::{ensure_success, LineClient};

/// LINE accepts at most this many tappable areas per menu
pub const MAX_AREAS: usize = 20;

/// Tap action of one grid cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ButtonAction {
    /// Open a URL
    Uri { data: String },
    /// Send a text message as the user (e.g., the activation phrase)
    Message { data: String },
}

impl ButtonAction {
    fn to_json(&self) -> Value {
        match self {
            ButtonAction::Uri { data } => json!({"type": "uri", "uri": data}),
            ButtonAction::Message { data } => json!({"type": "message", "text": data}),
        }
    }
}

/// Rich menu layout loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichMenuLayout {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_chat_bar_text")]
    pub chat_bar_text: String,
    #[serde(default = "default_selected")]
    pub selected: bool,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_columns")]
    pub columns: u32,
    /// Buttons in reading order, left to right then top to bottom
    pub buttons: Vec<ButtonAction>,
}

fn default_name() -> String {
    "ConciergeMenu".to_string()
}

fn default_chat_bar_text() -> String {
    "メニュー".to_string()
}

fn default_selected() -> bool {
    true
}

fn default_width() -> u32 {
    2500
}

fn default_height() -> u32 {
    1686
}

fn default_columns() -> u32 {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RichMenuLayout {
    pub fn from_toml(content: &str) -> Result<Self> {
        let layout: Self = toml::from_str(content).context("Failed to parse rich menu layout")?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid layout in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.buttons.is_empty() {
            anyhow::bail!("Rich menu layout must define at least one button");
        }
        if self.buttons.len() > MAX_AREAS {
            anyhow::bail!(
                "Rich menu layout has {} buttons, LINE allows at most {}",
                self.buttons.len(),
                MAX_AREAS
            );
        }
        if self.columns == 0 {
            anyhow::bail!("Rich menu columns must be greater than zero");
        }
        if self.rows() > self.height {
            anyhow::bail!("Rich menu is too short for {} rows", self.rows());
        }
        for (i, button) in self.buttons.iter().enumerate() {
            let (ButtonAction::Uri { data } | ButtonAction::Message { data }) = button;
            if data.trim().is_empty() {
                anyhow::bail!("Rich menu button {} has an empty action", i + 1);
            }
        }
        Ok(())
    }

    pub fn rows(&self) -> u32 {
        (self.buttons.len() as u32).div_ceil(self.columns)
    }

    /// Grid cell of the `index`-th button
    pub fn bounds(&self, index: usize) -> Bounds {
        let cell_width = self.width / self.columns;
        let cell_height = self.height / self.rows();
        let index = index as u32;
        Bounds {
            x: (index % self.columns) * cell_width,
            y: (index / self.columns) * cell_height,
            width: cell_width,
            height: cell_height,
        }
    }

    /// Request body for the create-rich-menu endpoint
    pub fn to_request(&self) -> Value {
        let areas: Vec<Value> = self
            .buttons
            .iter()
            .enumerate()
            .map(|(i, button)| {
                let b = self.bounds(i);
                json!({
                    "bounds": {"x": b.x, "y": b.y, "width": b.width, "height": b.height},
                    "action": button.to_json(),
                })
            })
            .collect();

        json!({
            "size": {"width": self.width, "height": self.height},
            "selected": self.selected,
            "name": self.name,
            "chatBarText": self.chat_bar_text,
            "areas": areas,
        })
    }
}

/// Image content type accepted by the upload endpoint, from the file name
pub fn image_content_type(path: &Path) -> Result<String> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    match mime.essence_str() {
        "image/png" | "image/jpeg" => Ok(mime.essence_str().to_string()),
        other => anyhow::bail!(
            "Rich menu image must be PNG or JPEG, got {} for {}",
            other,
            path.display()
        ),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RichMenuId {
    rich_menu_id: String,
}

#[derive(Debug, Deserialize)]
struct RichMenuList {
    #[serde(default)]
    richmenus: Vec<RichMenuId>,
}

impl LineClient {
    pub async fn list_rich_menus(&self) -> Result<Vec<String>> {
        let response = self
            .http()
            .get(self.api_url("/v2/bot/richmenu/list"))
            .bearer_auth(self.token())
            .send()
            .await
            .context("Failed to list rich menus")?;
        let list: RichMenuList = ensure_success(response, "rich menu list")
            .await?
            .json()
            .await
            .context("Failed to decode rich menu list")?;
        Ok(list.richmenus.into_iter().map(|m| m.rich_menu_id).collect())
    }

    pub async fn delete_rich_menu(&self, rich_menu_id: &str) -> Result<()> {
        let response = self
            .http()
            .delete(self.api_url(&format!("/v2/bot/richmenu/{}", rich_menu_id)))
            .bearer_auth(self.token())
            .send()
            .await
            .context("Failed to delete rich menu")?;
        ensure_success(response, "rich menu delete").await?;
        Ok(())
    }

    pub async fn create_rich_menu(&self, layout: &RichMenuLayout) -> Result<String> {
        let response = self
            .http()
            .post(self.api_url("/v2/bot/richmenu"))
            .bearer_auth(self.token())
            .json(&layout.to_request())
            .send()
            .await
            .context("Failed to create rich menu")?;
        let created: RichMenuId = ensure_success(response, "rich menu create")
            .await?
            .json()
            .await
            .context("Failed to decode created rich menu")?;
        Ok(created.rich_menu_id)
    }

    pub async fn upload_rich_menu_image(
        &self,
        rich_menu_id: &str,
        content_type: &str,
        image: Vec<u8>,
    ) -> Result<()> {
        let response = self
            .http()
            .post(self.data_api_url(&format!("/v2/bot/richmenu/{}/content", rich_menu_id)))
            .bearer_auth(self.token())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(image)
            .send()
            .await
            .context("Failed to upload rich menu image")?;
        ensure_success(response, "rich menu image upload").await?;
        Ok(())
    }

    pub async fn set_default_rich_menu(&self, rich_menu_id: &str) -> Result<()> {
        let response = self
            .http()
            .post(self.api_url(&format!("/v2/bot/user/all/richmenu/{}", rich_menu_id)))
            .bearer_auth(self.token())
            .send()
            .await
            .context("Failed to set default rich menu")?;
        ensure_success(response, "rich menu set default").await?;
        Ok(())
    }

    /// Replace every existing rich menu with `layout` and make it the default.
    /// Returns the new rich menu id.
    pub async fn install_rich_menu(
        &self,
        layout: &RichMenuLayout,
        content_type: &str,
        image: Vec<u8>,
    ) -> Result<String> {
        let existing = self.list_rich_menus().await?;
        for id in &existing {
            self.delete_rich_menu(id).await?;
            tracing::info!(rich_menu_id = %id, "Deleted rich menu");
        }

        let id = self.create_rich_menu(layout).await?;
        tracing::info!(rich_menu_id = %id, areas = layout.buttons.len(), "Created rich menu");

        self.upload_rich_menu_image(&id, content_type, image).await?;
        self.set_default_rich_menu(&id).await?;
        tracing::info!(rich_menu_id = %id, "Rich menu set as default");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWELVE_BUTTONS: &str = r#"
name = "FinalMenu"

[[buttons]]
type = "uri"
data = "https://example.com/1"
[[buttons]]
type = "uri"
data = "https://example.com/2"
[[buttons]]
type = "uri"
data = "https://example.com/3"
[[buttons]]
type = "uri"
data = "https://example.com/4"
[[buttons]]
type = "uri"
data = "https://example.com/5"
[[buttons]]
type = "uri"
data = "https://example.com/6"
[[buttons]]
type = "uri"
data = "https://example.com/7"
[[buttons]]
type = "uri"
data = "https://example.com/8"
[[buttons]]
type = "uri"
data = "https://example.com/9"
[[buttons]]
type = "uri"
data = "https://example.com/10"
[[buttons]]
type = "uri"
data = "https://example.com/11"
[[buttons]]
type = "message"
data = "AIチャットボット起動"
"#;

    #[test]
    fn test_default_grid_is_four_by_three() {
        let layout = RichMenuLayout::from_toml(TWELVE_BUTTONS).unwrap();
        assert_eq!(layout.rows(), 3);
        assert_eq!(
            layout.bounds(0),
            Bounds { x: 0, y: 0, width: 625, height: 562 }
        );
        assert_eq!(
            layout.bounds(5),
            Bounds { x: 625, y: 562, width: 625, height: 562 }
        );
        assert_eq!(
            layout.bounds(11),
            Bounds { x: 1875, y: 1124, width: 625, height: 562 }
        );
    }

    #[test]
    fn test_request_body_shape() {
        let layout = RichMenuLayout::from_toml(TWELVE_BUTTONS).unwrap();
        let body = layout.to_request();
        assert_eq!(body["size"]["width"], 2500);
        assert_eq!(body["size"]["height"], 1686);
        assert_eq!(body["selected"], true);
        assert_eq!(body["name"], "FinalMenu");
        assert_eq!(body["chatBarText"], "メニュー");
        let areas = body["areas"].as_array().unwrap();
        assert_eq!(areas.len(), 12);
        assert_eq!(areas[0]["action"], json!({"type": "uri", "uri": "https://example.com/1"}));
        assert_eq!(
            areas[11]["action"],
            json!({"type": "message", "text": "AIチャットボット起動"})
        );
    }

    #[test]
    fn test_validation_rejects_bad_layouts() {
        assert!(RichMenuLayout::from_toml("buttons = []").is_err());
        assert!(RichMenuLayout::from_toml(
            "columns = 0\n[[buttons]]\ntype = \"uri\"\ndata = \"https://a\""
        )
        .is_err());
        assert!(
            RichMenuLayout::from_toml("[[buttons]]\ntype = \"message\"\ndata = \"  \"").is_err()
        );
        assert!(
            RichMenuLayout::from_toml("[[buttons]]\ntype = \"postback\"\ndata = \"x\"").is_err()
        );
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(
            image_content_type(Path::new("menu_image.png")).unwrap(),
            "image/png"
        );
        assert_eq!(
            image_content_type(Path::new("menu.JPG")).unwrap(),
            "image/jpeg"
        );
        assert!(image_content_type(Path::new("menu.gif")).is_err());
    }
}
