mod properties_format;
