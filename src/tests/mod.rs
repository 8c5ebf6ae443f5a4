
mod test_backend_selection;
mod test_cache;
mod test_media;
