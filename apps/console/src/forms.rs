//! Field access for the modal forms of each screen.

use client_core::{AlbumDraft, UserDraft};

pub trait FormView {
    const CREATE_TITLE: &'static str;
    const EDIT_TITLE: &'static str;
    const FIELDS: &'static [&'static str];

    fn field(&self, name: &str) -> Option<&str>;
    fn field_mut(&mut self, name: &str) -> Option<&mut String>;

    fn is_secret(_name: &str) -> bool {
        false
    }
}

impl FormView for AlbumDraft {
    const CREATE_TITLE: &'static str = "Add Album";
    const EDIT_TITLE: &'static str = "Edit Album";
    const FIELDS: &'static [&'static str] = &["name"];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "name" => Some(&mut self.name),
            _ => None,
        }
    }
}

impl FormView for UserDraft {
    const CREATE_TITLE: &'static str = "Add New User";
    const EDIT_TITLE: &'static str = "Edit User";
    const FIELDS: &'static [&'static str] = &["name", "email", "password"];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "email" => Some(&self.email),
            "password" => Some(&self.password),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "name" => Some(&mut self.name),
            "email" => Some(&mut self.email),
            "password" => Some(&mut self.password),
            _ => None,
        }
    }

    fn is_secret(name: &str) -> bool {
        name == "password"
    }
}
