//! Built-in project templates
//!
//! The catalogue is static; picking a template seeds a new project with the
//! template's name, description and thumbnail.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSettings {
    pub quality_preset: &'static str,
    pub analytics_enabled: bool,
    pub offline_access: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub thumbnail: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub default_settings: TemplateSettings,
}

pub static TEMPLATES: &[Template] = &[
    Template {
        id: "template-1",
        name: "Crane Operation AR Simulator",
        description: "Interactive training for crane operators with real-time physics feedback",
        thumbnail: "https://images.unsplash.com/photo-1487958449943-2429e8be8625",
        kind: "Equipment Simulation",
        default_settings: TemplateSettings {
            quality_preset: "high",
            analytics_enabled: true,
            offline_access: false,
        },
    },
    Template {
        id: "template-2",
        name: "Structural Steel Assembly Guide",
        description: "Step-by-step AR instructions for steel beam installation",
        thumbnail: "https://images.unsplash.com/photo-1600585154340-be6161a56a0c?auto=format&fit=crop&w=800&q=80",
        kind: "Assembly Guidance",
        default_settings: TemplateSettings {
            quality_preset: "medium",
            analytics_enabled: true,
            offline_access: true,
        },
    },
    Template {
        id: "template-3",
        name: "Site Safety Hazard Scanner",
        description: "AR overlay identifying potential safety risks on construction sites",
        thumbnail: "https://images.unsplash.com/photo-1570129477492-45c003edd2be?auto=format&fit=crop&w=800&q=80",
        kind: "Safety Training",
        default_settings: TemplateSettings {
            quality_preset: "ultra",
            analytics_enabled: false,
            offline_access: false,
        },
    },
    Template {
        id: "template-4",
        name: "AR Business Card Design",
        description: "Create AR-enabled business cards with your logo and an intro video",
        thumbnail: "https://images.unsplash.com/photo-1511715280172-233c42b6a83e?auto=format&fit=crop&w=800&q=80",
        kind: "Design",
        default_settings: TemplateSettings {
            quality_preset: "high",
            analytics_enabled: true,
            offline_access: false,
        },
    },
];

pub fn find_template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}
