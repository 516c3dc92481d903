//! Per-breakpoint grid layouts and the enabled-widget list.

use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{LayoutItem, LayoutState, WidgetConfig};
use crate::widgets::{WidgetDescriptor, WidgetRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Breakpoint names and their column counts.
pub const BREAKPOINTS: [(&str, u32); 3] = [("lg", 12), ("md", 12), ("sm", 6)];
pub const DEFAULT_ENABLED_WIDGETS: [&str; 4] = ["habits", "mood", "notes", "pomodoro"];

pub fn columns_for(breakpoint: &str) -> Option<u32> {
    BREAKPOINTS
        .iter()
        .find(|(name, _)| *name == breakpoint)
        .map(|(_, columns)| *columns)
}

pub struct LayoutStore {
    db: Arc<Database>,
    configs: Vec<WidgetConfig>,
}

impl LayoutStore {
    /// `configs` in registration order; they seed the default layouts.
    pub fn new(db: Arc<Database>, configs: Vec<WidgetConfig>) -> Self {
        Self { db, configs }
    }

    pub fn default_state(&self) -> LayoutState {
        let enabled: Vec<String> = DEFAULT_ENABLED_WIDGETS.iter().map(|id| id.to_string()).collect();
        let layouts = BREAKPOINTS
            .iter()
            .map(|(name, columns)| {
                let configs: Vec<&WidgetConfig> = self
                    .configs
                    .iter()
                    .filter(|config| enabled.contains(&config.id))
                    .collect();
                (name.to_string(), pack_rows(&configs, *columns, 0))
            })
            .collect();
        LayoutState {
            layouts,
            enabled_widgets: enabled,
        }
    }

    pub fn state(&self) -> AppResult<LayoutState> {
        Ok(self.db.get_layout_state()?.unwrap_or_else(|| self.default_state()))
    }

    pub fn layouts(&self) -> AppResult<BTreeMap<String, Vec<LayoutItem>>> {
        Ok(self.state()?.layouts)
    }

    pub fn enabled_widgets(&self) -> AppResult<Vec<String>> {
        Ok(self.state()?.enabled_widgets)
    }

    pub fn set_layout(&self, breakpoint: &str, items: Vec<LayoutItem>) -> AppResult<()> {
        validate_items(breakpoint, &items)?;
        let mut state = self.state()?;
        state.layouts.insert(breakpoint.to_string(), items);
        self.db.save_layout_state(&state)
    }

    pub fn set_all_layouts(&self, layouts: BTreeMap<String, Vec<LayoutItem>>) -> AppResult<()> {
        for (breakpoint, items) in &layouts {
            validate_items(breakpoint, items)?;
        }
        let mut state = self.state()?;
        state.layouts = layouts;
        self.db.save_layout_state(&state)
    }

    /// Returns whether the widget is enabled afterwards.
    pub fn toggle_widget(&self, widget_id: &str) -> AppResult<bool> {
        let mut state = self.state()?;
        let enabled = if state.enabled_widgets.iter().any(|id| id == widget_id) {
            state.enabled_widgets.retain(|id| id != widget_id);
            false
        } else {
            state.enabled_widgets.push(widget_id.to_string());
            true
        };
        self.db.save_layout_state(&state)?;
        tracing::info!(widget_id, enabled, "widget toggled");
        Ok(enabled)
    }

    pub fn enable_widget(&self, widget_id: &str) -> AppResult<()> {
        let mut state = self.state()?;
        if !state.enabled_widgets.iter().any(|id| id == widget_id) {
            state.enabled_widgets.push(widget_id.to_string());
            self.db.save_layout_state(&state)?;
        }
        Ok(())
    }

    pub fn disable_widget(&self, widget_id: &str) -> AppResult<()> {
        let mut state = self.state()?;
        let before = state.enabled_widgets.len();
        state.enabled_widgets.retain(|id| id != widget_id);
        if state.enabled_widgets.len() != before {
            self.db.save_layout_state(&state)?;
        }
        Ok(())
    }

    pub fn is_widget_enabled(&self, widget_id: &str) -> AppResult<bool> {
        Ok(self.state()?.enabled_widgets.iter().any(|id| id == widget_id))
    }

    pub fn reset_layouts(&self) -> AppResult<LayoutState> {
        let state = self.default_state();
        self.db.save_layout_state(&state)?;
        Ok(state)
    }

    /// Stored items for `breakpoint` plus placements for enabled widgets that
    /// have none yet, packed below the existing grid.
    pub fn layout_for(&self, breakpoint: &str) -> AppResult<Vec<LayoutItem>> {
        let columns = columns_for(breakpoint)
            .ok_or_else(|| AppError::Validation(format!("unknown breakpoint '{}'", breakpoint)))?;
        let state = self.state()?;
        let mut items = state.layouts.get(breakpoint).cloned().unwrap_or_default();
        let missing: Vec<&WidgetConfig> = self
            .configs
            .iter()
            .filter(|config| state.enabled_widgets.contains(&config.id))
            .filter(|config| !items.iter().any(|item| item.i == config.id))
            .collect();
        let floor = items.iter().map(|item| item.y + item.h).max().unwrap_or(0);
        items.extend(pack_rows(&missing, columns, floor));
        Ok(items)
    }

    /// Registered widgets that are enabled, in registration order.
    pub fn visible_widgets(&self, registry: &WidgetRegistry) -> AppResult<Vec<Arc<WidgetDescriptor>>> {
        let enabled = self.enabled_widgets()?;
        Ok(registry
            .list_all()
            .into_iter()
            .filter(|descriptor| enabled.iter().any(|id| id == descriptor.id()))
            .collect())
    }
}

fn pack_rows(configs: &[&WidgetConfig], columns: u32, start_y: u32) -> Vec<LayoutItem> {
    let mut items = Vec::with_capacity(configs.len());
    let (mut x, mut y, mut row_height) = (0u32, start_y, 0u32);
    for config in configs {
        let sizes = config.sizes;
        let w = sizes.default_w.min(columns);
        if x > 0 && x + w > columns {
            x = 0;
            y += row_height;
            row_height = 0;
        }
        items.push(LayoutItem {
            i: config.id.clone(),
            x,
            y,
            w,
            h: sizes.default_h,
            min_w: Some(sizes.min_w.min(columns)),
            min_h: Some(sizes.min_h),
            max_w: sizes.max_w.map(|max| max.min(columns)),
            max_h: sizes.max_h,
            pinned: false,
        });
        x += w;
        row_height = row_height.max(sizes.default_h);
    }
    items
}

fn validate_items(breakpoint: &str, items: &[LayoutItem]) -> AppResult<()> {
    let columns = columns_for(breakpoint)
        .ok_or_else(|| AppError::Validation(format!("unknown breakpoint '{}'", breakpoint)))?;
    for item in items {
        if item.w == 0 || item.h == 0 {
            return Err(AppError::Validation(format!("layout item '{}' has an empty size", item.i)));
        }
        if item.x + item.w > columns {
            return Err(AppError::Validation(format!(
                "layout item '{}' overflows the {} columns of '{}'",
                item.i, columns, breakpoint
            )));
        }
    }
    Ok(())
}
